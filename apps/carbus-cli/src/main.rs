//! # Carbus CLI
//!
//! 车辆 CAN 总线日志工具。
//!
//! ```bash
//! # 回放串口日志（`RX: 0x0AA Data: 00 00 ...` 格式），按 tick 解码并打印状态行
//! carbus-cli replay capture.log --tick-ms 10
//!
//! # 只打印经过解码器的原始帧
//! carbus-cli replay capture.log --raw
//!
//! # 解码单帧
//! carbus-cli decode 0AA:0000FF00A007
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod log_format;
mod status;

use commands::{DecodeCommand, ReplayCommand};

/// Carbus CLI - 车辆总线日志工具
#[derive(Parser, Debug)]
#[command(name = "carbus-cli")]
#[command(about = "Replay and decode vehicle CAN bus logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 回放日志文件，经过捕获 → 环形缓冲区 → 解码器
    Replay {
        #[command(flatten)]
        args: ReplayCommand,
    },

    /// 解码单帧
    Decode {
        #[command(flatten)]
        args: DecodeCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("carbus_cli=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { args } => args.execute(),
        Commands::Decode { args } => args.execute(),
    }
}
