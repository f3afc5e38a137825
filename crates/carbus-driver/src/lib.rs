//! 驱动层模块
//!
//! 车辆 CAN 总线的接收流水线和协作式命令调度：
//! - 中断上下文捕获（只拷贝原始帧，写入 SPSC 环形缓冲区）
//! - 状态解码（tick 上下文中清空缓冲区，按静态规则表更新车辆状态）
//! - 状态存储（ArcSwap 无锁快照读取）
//! - 命令调度（模拟物理按键的多步定时帧序列）
//! - 钩子系统：异步录制、自定义回调
//!
//! # 上下文
//!
//! 只有两个执行上下文：通知（中断）上下文和单一的协作 tick 上下文。
//! 两者之间只共享环形缓冲区；车辆状态和命令都只在 tick 上下文中修改。

mod builder;
mod bus;
pub mod capture;
pub mod command;
pub mod config;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod recording;
pub mod ring;
pub mod scheduler;
pub mod state;

pub use builder::VehicleBusBuilder;
pub use bus::{TickReport, VehicleBus};
pub use capture::{CaptureOutcome, FrameCapture, capture_loop, monotonic_micros};
pub use command::{CommandKind, CommandRequest, FrameBuffer, Phase, ScheduledCommand, TractionMode};
pub use config::{CaptureConfig, DriverConfig, SchedulerConfig};
pub use error::DriverError;
pub use hooks::{FrameCallback, HookManager};
pub use metrics::{BusMetrics, MetricsSnapshot};
pub use pipeline::{Decoder, DrainReport};
pub use recording::{AsyncRecordingHook, Direction, RecordedFrame};
pub use ring::{FrameRing, RingConsumer, RingProducer};
pub use scheduler::{CommandScheduler, ScheduleReport};
pub use state::*;
