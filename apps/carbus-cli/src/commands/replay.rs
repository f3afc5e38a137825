//! replay 命令
//!
//! 把串口日志中的接收帧按固定节拍送进捕获端，每个 tick 清空环形缓冲区并解码，
//! 与车上的运行方式相同。

use crate::log_format::parse_line;
use crate::status::status_line;
use anyhow::{Context, Result, bail};
use carbus_can::{CanError, TxAdapter};
use carbus_driver::{AsyncRecordingHook, DriverConfig, VehicleBusBuilder};
use carbus_protocol::RawFrame;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 回放命令参数
#[derive(Args, Debug)]
pub struct ReplayCommand {
    /// 日志文件路径
    pub input: PathBuf,

    /// tick 周期（毫秒）
    #[arg(long, default_value_t = 10)]
    pub tick_ms: u64,

    /// 每个 tick 送入的帧数（超过环形缓冲区容量的部分会被丢弃并计数）
    #[arg(long, default_value_t = 8)]
    pub frames_per_tick: usize,

    /// 打印经过解码器的原始帧，而不是状态行
    #[arg(long)]
    pub raw: bool,

    /// 驱动配置文件（TOML）
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 回放不向总线发送任何帧
struct DiscardTx;

impl TxAdapter for DiscardTx {
    fn send(&mut self, _frame: RawFrame) -> Result<(), CanError> {
        Ok(())
    }
}

impl ReplayCommand {
    pub fn execute(&self) -> Result<()> {
        if self.tick_ms == 0 {
            bail!("--tick-ms must be positive");
        }
        if self.frames_per_tick == 0 {
            bail!("--frames-per-tick must be positive");
        }

        let config = match &self.config {
            Some(path) => DriverConfig::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => DriverConfig::default(),
        };

        let content = std::fs::read_to_string(&self.input)
            .with_context(|| format!("failed to read {}", self.input.display()))?;

        let mut frames = Vec::new();
        for (number, line) in content.lines().enumerate() {
            match parse_line(line) {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => {},
                Err(e) => warn!("line {}: {:#}", number + 1, e),
            }
        }
        info!("{} frame(s) loaded from {}", frames.len(), self.input.display());

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();
        ctrlc::set_handler(move || {
            running_clone.store(false, Ordering::SeqCst);
        })
        .context("failed to set Ctrl-C handler")?;

        let (hook, recorded) =
            AsyncRecordingHook::with_capacity(config.capture.ring_capacity, false);
        let dropped = hook.dropped_frames().clone();

        let (mut bus, mut capture) = VehicleBusBuilder::new()
            .config(config)
            .hook(Arc::new(hook))
            .build(DiscardTx)?;

        let period = Duration::from_millis(self.tick_ms);
        let mut next_tick = Instant::now();
        let mut last_status = String::new();

        for chunk in frames.chunks(self.frames_per_tick) {
            if !running.load(Ordering::SeqCst) {
                println!();
                println!("replay interrupted");
                break;
            }

            for frame in chunk {
                capture.capture(*frame);
            }
            bus.tick();

            if self.raw {
                for entry in recorded.try_iter() {
                    println!("{}", entry);
                }
            } else {
                // 丢弃录制的帧，只在状态变化时打印
                recorded.try_iter().for_each(drop);
                let line = status_line(&bus.snapshot());
                if line != last_status {
                    println!("{}", line);
                    last_status = line;
                }
            }

            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }

        let metrics = bus.metrics_snapshot();
        println!();
        println!(
            "frames: {} captured, {} decoded, {} unknown id, {} partial, {} overflow drop(s)",
            metrics.frames_captured,
            metrics.frames_decoded,
            metrics.unknown_ids,
            metrics.partial_decodes,
            metrics.overflow_drops
        );
        let lost = dropped.load(Ordering::Relaxed);
        if lost > 0 {
            println!("{} frame(s) missing from raw output", lost);
        }

        Ok(())
    }
}
