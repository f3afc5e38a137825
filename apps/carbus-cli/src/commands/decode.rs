//! decode 命令
//!
//! 解码单帧并打印解码结果

use crate::log_format::parse_frame_spec;
use anyhow::Result;
use carbus_protocol::{decode, rule_for};
use clap::Args;

/// 解码命令参数
#[derive(Args, Debug)]
pub struct DecodeCommand {
    /// 帧，格式为 ID:HEX（例如 0AA:0000FF00A007）
    pub frame: String,
}

impl DecodeCommand {
    pub fn execute(&self) -> Result<()> {
        let frame = parse_frame_spec(&self.frame)?;
        println!("{}", frame);

        let Some(rule) = rule_for(frame.id) else {
            println!("unknown id 0x{:03X}", frame.id);
            return Ok(());
        };

        if rule.is_partial(frame.len()) {
            println!(
                "partial payload: {} of {} bytes, missing fields stay unchanged",
                frame.len(),
                rule.full_len
            );
        }

        if let Some(feedback) = decode(&frame) {
            println!("{}: {:#?}", rule.name, feedback);
        }
        Ok(())
    }
}
