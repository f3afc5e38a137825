//! 协议常量定义
//!
//! 比例系数、阈值和按键码。数值来自对实车总线的抓包分析。

/// 转速原始值比例（原始值 / 4 = RPM）
pub const RPM_DIVISOR: u16 = 4;

/// 发动机运转判定阈值（RPM）
pub const ENGINE_RUNNING_RPM: u16 = 400;

/// 油门原始值下限（松开踏板）
pub const THROTTLE_RAW_IDLE: u16 = 255;

/// 油门原始值量程（65064 - 255）
pub const THROTTLE_RAW_SPAN: u32 = 64_809;

/// 油门输出上限（255 保留给 kickdown）
pub const THROTTLE_MAX: u8 = 254;

/// 油门 kickdown 标记字节（Byte 6）
pub const THROTTLE_KICKDOWN_MARKER: u8 = 0xB4;

/// 扭矩比例（i16 / 32 = N·m）
pub const TORQUE_DIVISOR: f32 = 32.0;

/// 车速比例（原始值 / 100 = MPH）
pub const SPEED_DIVISOR: f32 = 100.0;

/// 方向盘转角：16 位字段的最大正值，超过即为负数
pub const STEERING_SIGN_THRESHOLD: u16 = 32_767;

/// 方向盘转角比例（原始值 / 23 = 度）
pub const STEERING_DIVISOR: f32 = 23.0;

/// 冷却液温度偏移（原始值 - 48 = °C）
pub const COOLANT_OFFSET: i16 = 48;

/// 蓄电池电压偏移与比例（(原始值 - 0xF000) / 68 = V）
pub const BATTERY_RAW_OFFSET: i32 = 0xF000;
pub const BATTERY_DIVISOR: f32 = 68.0;

/// 蓄电池电压输出范围（V）
pub const BATTERY_MIN_V: f32 = 0.0;
pub const BATTERY_MAX_V: f32 = 25.5;

/// 续航比例（原始值 / 16 = km）
pub const RANGE_DIVISOR: f32 = 16.0;

/// 制动压力原始值满量程
pub const BRAKE_PRESSURE_FULL_SCALE: u8 = 0x80;

/// 车窗位置原始值满量程（完全打开）
pub const WINDOW_FULL_SCALE: u8 = 0x50;

/// 空调温度原始值范围（0x20 = 16°C, 0x38 = 28°C）
pub const CLIMATE_TEMP_RAW_MIN: u8 = 0x20;
pub const CLIMATE_TEMP_RAW_MAX: u8 = 0x38;
pub const CLIMATE_TEMP_BASE_C: i8 = 16;

/// 出风模式 AUTO 的特征字节
pub const BLOWER_AUTO_PATTERN: [u8; 3] = [0x00, 0x64, 0x1E];

/// 顶灯亮度超过该值视为打开
pub const DOME_LIGHT_ON_THRESHOLD: u8 = 50;

/// 功率换算系数（kW = RPM × N·m / 9549.2965855）
pub const POWER_DIVISOR: f32 = 9_549.296_6;

// ============================================================================
// 控制帧按键码
// ============================================================================

/// 顶灯按键：按下 / 释放
pub const DOME_LIGHT_PRESS: [u8; 2] = [0xF1, 0xFF];
pub const DOME_LIGHT_RELEASE: [u8; 2] = [0xF0, 0xFF];

/// 座椅加热按键：按下 / 释放
pub const SEAT_HEATER_PRESS: [u8; 1] = [0xD0];
pub const SEAT_HEATER_RELEASE: [u8; 1] = [0xC0];

/// 牵引力控制按键：按下 / 释放
pub const TRACTION_CONTROL_PRESS: [u8; 2] = [0xFD, 0xFF];
pub const TRACTION_CONTROL_RELEASE: [u8; 2] = [0xFC, 0xFF];

/// 提示音：开始 / 结束
pub const CHIME_START: [u8; 2] = [0x01, 0xF8];
pub const CHIME_STOP: [u8; 2] = [0x00, 0xF8];

/// 车窗控制帧基准（所有按键释放）
pub const WINDOW_NEUTRAL: [u8; 3] = [0xC0, 0xC0, 0xFF];

/// 车窗控制位（Byte 0 前排 / Byte 1 后排）
pub const WINDOW_LEFT_DOWN: u8 = 0x02;
pub const WINDOW_LEFT_UP: u8 = 0x04;
pub const WINDOW_RIGHT_DOWN: u8 = 0x10;
pub const WINDOW_RIGHT_UP: u8 = 0x20;

/// 仪表提示信息固定尾部（Byte 2-7）
pub const CLUSTER_MESSAGE_TAIL: [u8; 6] = [0x20, 0xF0, 0x00, 0xFE, 0xFE, 0xFE];
