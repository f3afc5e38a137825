//! 驱动层错误类型定义
//!
//! 运行时路径上的情况（缓冲区溢出、未知 ID、发送失败）只计数和记录日志，
//! 不会变成 `DriverError`；这里只覆盖构造和配置阶段的失败。

use carbus_can::CanError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// CAN 驱动错误
    #[error("CAN driver error: {0}")]
    Can(#[from] CanError),

    /// 配置文件读取失败
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// 配置文件解析失败
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// 配置值不合法
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// 捕获线程启动失败
    #[error("Capture thread error: {0}")]
    CaptureThread(String),
}
