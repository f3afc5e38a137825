//! 控制帧构建
//!
//! 本设备通过向总线注入与物理按键相同的帧来改变车辆状态。
//! 每个按键由"按下"和"释放"两帧组成，时序由上层调度器负责，这里只负责字节。

use crate::constants::*;
use crate::feedback::{Corner, WindowMask};
use crate::ids::*;
use crate::RawFrame;

/// 按键动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Press,
    Release,
}

// ============================================================================
// 顶灯 / 牵引力控制 / 座椅加热按键
// ============================================================================

/// 顶灯按键 (0x1E3)
#[derive(Debug, Clone, Copy)]
pub struct DomeLightButton {
    pub action: ButtonAction,
}

impl DomeLightButton {
    pub fn new(action: ButtonAction) -> Self {
        Self { action }
    }

    pub fn to_frame(self) -> RawFrame {
        let data = match self.action {
            ButtonAction::Press => DOME_LIGHT_PRESS,
            ButtonAction::Release => DOME_LIGHT_RELEASE,
        };
        RawFrame::new_standard(ID_DOME_LIGHT_BUTTON as u16, &data)
    }
}

/// 牵引力控制按键 (0x316)
///
/// 短按切换，长按（约 1 秒）完全关闭；按住时长由调度器决定。
#[derive(Debug, Clone, Copy)]
pub struct TractionControlButton {
    pub action: ButtonAction,
}

impl TractionControlButton {
    pub fn new(action: ButtonAction) -> Self {
        Self { action }
    }

    pub fn to_frame(self) -> RawFrame {
        let data = match self.action {
            ButtonAction::Press => TRACTION_CONTROL_PRESS,
            ButtonAction::Release => TRACTION_CONTROL_RELEASE,
        };
        RawFrame::new_standard(ID_TRACTION_CONTROL_BUTTON as u16, &data)
    }
}

/// 座椅加热按键 (0x1E7)，单字节载荷
#[derive(Debug, Clone, Copy)]
pub struct SeatHeaterButton {
    pub action: ButtonAction,
}

impl SeatHeaterButton {
    pub fn new(action: ButtonAction) -> Self {
        Self { action }
    }

    pub fn to_frame(self) -> RawFrame {
        let data = match self.action {
            ButtonAction::Press => SEAT_HEATER_PRESS,
            ButtonAction::Release => SEAT_HEATER_RELEASE,
        };
        RawFrame::new_standard(ID_SEAT_HEATER_BUTTON as u16, &data)
    }
}

/// 座椅加热档位
///
/// 物理按键每按一次沿 关 → 高 → 中 → 低 → 关 循环前进，不能后退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::FromPrimitive)]
#[repr(u8)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeaterLevel {
    #[default]
    Off = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

impl HeaterLevel {
    /// 按键循环顺序
    pub const CYCLE: [HeaterLevel; 4] = [
        HeaterLevel::Off,
        HeaterLevel::High,
        HeaterLevel::Medium,
        HeaterLevel::Low,
    ];

    fn cycle_index(self) -> usize {
        match self {
            HeaterLevel::Off => 0,
            HeaterLevel::High => 1,
            HeaterLevel::Medium => 2,
            HeaterLevel::Low => 3,
        }
    }

    /// 按一次按键后的档位
    pub fn next(self) -> HeaterLevel {
        Self::CYCLE[(self.cycle_index() + 1) % Self::CYCLE.len()]
    }

    /// 从当前档位到达 `target` 需要的最少按键次数（只能前进）
    pub fn presses_to(self, target: HeaterLevel) -> u8 {
        let len = Self::CYCLE.len();
        ((target.cycle_index() + len - self.cycle_index()) % len) as u8
    }
}

// ============================================================================
// 车窗
// ============================================================================

/// 车窗动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WindowMotion {
    /// 松开按键
    #[default]
    Neutral,
    RollDown,
    RollUp,
}

/// 车窗控制帧 (0x0FA)
///
/// 布局：
/// - Byte 0: 前排，基准 0xC0，左侧 Bit 1 降 / Bit 2 升，右侧 Bit 4 降 / Bit 5 升
/// - Byte 1: 后排，位定义同 Byte 0
/// - Byte 2: 固定 0xFF
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCommand {
    pub windows: WindowMask,
    pub motion: WindowMotion,
}

impl WindowCommand {
    pub fn new(windows: WindowMask, motion: WindowMotion) -> Self {
        Self { windows, motion }
    }

    /// 所有按键释放
    pub fn neutral() -> Self {
        Self {
            windows: WindowMask::NONE,
            motion: WindowMotion::Neutral,
        }
    }

    pub fn to_frame(self) -> RawFrame {
        let mut data = WINDOW_NEUTRAL;

        let (left, right) = match self.motion {
            WindowMotion::Neutral => (0, 0),
            WindowMotion::RollDown => (WINDOW_LEFT_DOWN, WINDOW_RIGHT_DOWN),
            WindowMotion::RollUp => (WINDOW_LEFT_UP, WINDOW_RIGHT_UP),
        };

        for corner in Corner::ALL {
            if !self.windows.contains(corner) {
                continue;
            }
            match corner {
                Corner::DriverFront => data[0] |= left,
                Corner::PassengerFront => data[0] |= right,
                Corner::DriverRear => data[1] |= left,
                Corner::PassengerRear => data[1] |= right,
            }
        }

        RawFrame::new_standard(ID_WINDOW_CONTROL as u16, &data)
    }
}

// ============================================================================
// 仪表
// ============================================================================

/// 仪表提示音 (0x24B)
#[derive(Debug, Clone, Copy)]
pub struct ChimeCommand {
    pub on: bool,
}

impl ChimeCommand {
    pub fn start() -> Self {
        Self { on: true }
    }

    pub fn stop() -> Self {
        Self { on: false }
    }

    pub fn to_frame(self) -> RawFrame {
        let data = if self.on { CHIME_START } else { CHIME_STOP };
        RawFrame::new_standard(ID_CHIME as u16, &data)
    }
}

/// 仪表提示信息 (0x338)
///
/// Byte 0-1 为提示码（小端），Byte 2-7 固定。
#[derive(Debug, Clone, Copy)]
pub struct ClusterMessageCommand {
    pub code: u16,
}

impl ClusterMessageCommand {
    pub fn new(code: u16) -> Self {
        Self { code }
    }

    pub fn to_frame(self) -> RawFrame {
        let mut data = [0u8; 8];
        data[0..2].copy_from_slice(&self.code.to_le_bytes());
        data[2..8].copy_from_slice(&CLUSTER_MESSAGE_TAIL);
        RawFrame::new_standard(ID_CLUSTER_MESSAGE as u16, &data)
    }
}
