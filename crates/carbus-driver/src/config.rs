//! 驱动配置
//!
//! 从 TOML 加载，缺省的字段取默认值（即车上固件使用的常量）：
//!
//! ```toml
//! [capture]
//! ring_capacity = 32
//! receive_timeout_ms = 2
//!
//! [scheduler]
//! button_press_ms = 200
//! button_gap_ms = 200
//! window_frame_interval_ms = 200
//! window_duration_ms = 3000
//! traction_tap_ms = 80
//! traction_hold_ms = 1000
//! chime_hold_ms = 150
//! ```

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// 驱动配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub capture: CaptureConfig,
    pub scheduler: SchedulerConfig,
}

/// 捕获与环形缓冲区配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    /// 环形缓冲区容量（帧）
    pub ring_capacity: usize,
    /// 捕获线程阻塞接收的超时（毫秒），决定停止捕获时的最大等待
    pub receive_timeout_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 32,
            receive_timeout_ms: 2,
        }
    }
}

impl CaptureConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// 命令调度时序（毫秒）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// 按键按下到松开
    pub button_press_ms: u64,
    /// 连续按键之间的间隔
    pub button_gap_ms: u64,
    /// 车窗控制帧重发间隔
    pub window_frame_interval_ms: u64,
    /// 车窗动作总时长，之后发出释放帧
    pub window_duration_ms: u64,
    /// 牵引力控制短按
    pub traction_tap_ms: u64,
    /// 牵引力控制长按
    pub traction_hold_ms: u64,
    /// 提示音持续时间
    pub chime_hold_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            button_press_ms: 200,
            button_gap_ms: 200,
            window_frame_interval_ms: 200,
            window_duration_ms: 3000,
            traction_tap_ms: 80,
            traction_hold_ms: 1000,
            chime_hold_ms: 150,
        }
    }
}

impl SchedulerConfig {
    pub fn button_press(&self) -> Duration {
        Duration::from_millis(self.button_press_ms)
    }

    pub fn button_gap(&self) -> Duration {
        Duration::from_millis(self.button_gap_ms)
    }

    pub fn window_frame_interval(&self) -> Duration {
        Duration::from_millis(self.window_frame_interval_ms)
    }

    pub fn window_duration(&self) -> Duration {
        Duration::from_millis(self.window_duration_ms)
    }

    pub fn traction_tap(&self) -> Duration {
        Duration::from_millis(self.traction_tap_ms)
    }

    pub fn traction_hold(&self) -> Duration {
        Duration::from_millis(self.traction_hold_ms)
    }

    pub fn chime_hold(&self) -> Duration {
        Duration::from_millis(self.chime_hold_ms)
    }
}

impl DriverConfig {
    /// 从 TOML 字符串解析并校验
    pub fn from_toml_str(content: &str) -> Result<Self, DriverError> {
        let config: DriverConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// 校验配置
    ///
    /// 0 容量和 0 重发间隔是错误；按键保持时间为 0 合法但几乎一定不是想要的，只给出警告。
    pub fn validate(&self) -> Result<(), DriverError> {
        if self.capture.ring_capacity == 0 {
            return Err(DriverError::InvalidConfig(
                "capture.ring_capacity must be non-zero".to_string(),
            ));
        }

        let scheduler = &self.scheduler;
        if scheduler.window_frame_interval_ms == 0 {
            return Err(DriverError::InvalidConfig(
                "scheduler.window_frame_interval_ms must be non-zero".to_string(),
            ));
        }
        if scheduler.traction_hold_ms < scheduler.traction_tap_ms {
            return Err(DriverError::InvalidConfig(format!(
                "scheduler.traction_hold_ms ({}) is shorter than traction_tap_ms ({})",
                scheduler.traction_hold_ms, scheduler.traction_tap_ms
            )));
        }

        if scheduler.button_press_ms == 0 {
            warn!(
                "scheduler.button_press_ms is 0: presses and releases go out on consecutive ticks"
            );
        }
        if scheduler.window_duration_ms < scheduler.window_frame_interval_ms {
            warn!(
                "scheduler.window_duration_ms ({}) is shorter than one frame interval ({})",
                scheduler.window_duration_ms, scheduler.window_frame_interval_ms
            );
        }

        Ok(())
    }
}
