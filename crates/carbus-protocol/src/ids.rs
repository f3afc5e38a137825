//! CAN ID 常量定义
//!
//! 定义所有已知车身总线帧的 CAN ID 常量。
//! 未列出的 ID 由解码器直接忽略。

// ============================================================================
// 反馈帧 ID 常量（车辆 → 本设备）
// ============================================================================

/// 制动开关、发动机扭矩
pub const ID_BRAKE_TORQUE: u32 = 0x0A8;

/// 发动机转速、油门踏板
pub const ID_ENGINE_RPM_THROTTLE: u32 = 0x0AA;

/// 方向盘转角
pub const ID_STEERING_ANGLE: u32 = 0x0C8;

/// 中控锁状态
pub const ID_CENTRAL_LOCKING: u32 = 0x0E2;

/// 车门开关（汇总）
pub const ID_DOOR_STATUS: u32 = 0x0E6;

/// 后视镜折叠
pub const ID_MIRRORS: u32 = 0x0F6;

/// 钥匙位置（高置信度点火信息源，部分车型没有）
pub const ID_KEY_STATE: u32 = 0x130;

/// 车速
pub const ID_VEHICLE_SPEED: u32 = 0x1A1;

/// 驻车制动
pub const ID_PARKING_BRAKE: u32 = 0x1B4;

/// 冷却液温度
pub const ID_ENGINE_TEMP: u32 = 0x1D0;

/// 方向盘按键
pub const ID_STEERING_BUTTONS: u32 = 0x1D6;

/// 驾驶员侧车门
pub const ID_DRIVER_DOOR: u32 = 0x1E1;

/// 空调压缩机 / 鼓风机开关
pub const ID_AC_STATUS: u32 = 0x242;

/// 顶灯亮度
pub const ID_DOME_LIGHT: u32 = 0x286;

/// 制动压力
pub const ID_BRAKE_PRESSURE: u32 = 0x2B2;

/// 风量、驾驶员温度、出风模式
pub const ID_CLIMATE_DRIVER: u32 = 0x2E6;

/// 乘客温度
pub const ID_CLIMATE_PASSENGER: u32 = 0x2EA;

/// 安全带
pub const ID_SEAT_BELT: u32 = 0x2F1;

/// 各车门开关（按位）
pub const ID_DOOR_BITS: u32 = 0x2FC;

/// 挡位
pub const ID_GEAR: u32 = 0x304;

/// 里程、油量、续航
pub const ID_ODOMETER_FUEL: u32 = 0x330;

/// 蓄电池电压、发动机标志（点火信息的回退来源）
pub const ID_BATTERY_ENGINE: u32 = 0x3B4;

/// 车窗位置（0x3B6~0x3B9）
pub const ID_WINDOW_DRIVER_FRONT: u32 = 0x3B6;
pub const ID_WINDOW_DRIVER_REAR: u32 = 0x3B7;
pub const ID_WINDOW_PASSENGER_FRONT: u32 = 0x3B8;
pub const ID_WINDOW_PASSENGER_REAR: u32 = 0x3B9;

// ============================================================================
// 控制帧 ID 常量（本设备 → 车辆，模拟物理按键）
// ============================================================================

/// 车窗升降按键
pub const ID_WINDOW_CONTROL: u32 = 0x0FA;

/// 顶灯按键
pub const ID_DOME_LIGHT_BUTTON: u32 = 0x1E3;

/// 座椅加热按键
pub const ID_SEAT_HEATER_BUTTON: u32 = 0x1E7;

/// 仪表提示音
pub const ID_CHIME: u32 = 0x24B;

/// 牵引力控制按键
pub const ID_TRACTION_CONTROL_BUTTON: u32 = 0x316;

/// 仪表提示信息
pub const ID_CLUSTER_MESSAGE: u32 = 0x338;

/// 判断是否为控制帧 ID
pub fn is_control_id(id: u32) -> bool {
    matches!(
        id,
        ID_WINDOW_CONTROL
            | ID_DOME_LIGHT_BUTTON
            | ID_SEAT_HEATER_BUTTON
            | ID_CHIME
            | ID_TRACTION_CONTROL_BUTTON
            | ID_CLUSTER_MESSAGE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_control_id() {
        assert!(is_control_id(ID_DOME_LIGHT_BUTTON));
        assert!(is_control_id(ID_CLUSTER_MESSAGE));
        assert!(!is_control_id(ID_ENGINE_RPM_THROTTLE));
        assert!(!is_control_id(0x7FF));
    }
}
