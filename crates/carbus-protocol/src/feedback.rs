//! 反馈帧解码规则
//!
//! 每个已知 CAN ID 对应一条 [`DecodeRule`]，规则是纯函数：
//! 相同的字节输入永远得到相同的 [`Feedback`]，不读取也不修改任何状态。
//!
//! 载荷长度不足时只跳过无法计算的字段（字段为 `None`），其余字段照常解码。
//! 规则表按 ID 升序排列，查找使用二分法。

use crate::constants::*;
use crate::ids::*;
use crate::{RawFrame, bit, nibble, twos_complement_16, u16_be, u16_le, u24_le};
use bilge::prelude::*;

// ============================================================================
// 枚举类型定义
// ============================================================================

/// 钥匙位置（0x130 Byte 0）
///
/// 无法识别的原始值映射为 `Unrecognized`，派生判断按"熄火"处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum KeyState {
    /// 熄火（无钥匙）
    EngineOff = 0x00,
    /// 钥匙插入中
    Inserting = 0x40,
    /// 一档（附件电源）
    Position1 = 0x41,
    /// 二档（点火）
    Position2 = 0x45,
    /// 启动中
    Cranking = 0x55,
    /// 无法识别的原始值
    #[default]
    Unrecognized = 0xFF,
}

/// 挡位（0x304 Byte 0）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum GearPosition {
    /// 未知 / 无法识别
    #[default]
    Unknown = 0x00,
    Park = 0xE3,
    Reverse = 0xC2,
    Neutral = 0xD1,
    Drive = 0xC7,
}

impl GearPosition {
    /// 挡位字母（状态行输出用）
    pub fn as_char(self) -> char {
        match self {
            GearPosition::Park => 'P',
            GearPosition::Reverse => 'R',
            GearPosition::Neutral => 'N',
            GearPosition::Drive => 'D',
            GearPosition::Unknown => '?',
        }
    }
}

/// 油门踏板状态（0x0AA）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// 踏板位置 0-254
    Pedal(u8),
    /// 踩到底（kickdown）
    Kickdown,
}

impl Default for Throttle {
    fn default() -> Self {
        Throttle::Pedal(0)
    }
}

impl Throttle {
    /// 单字节表示：0-254 为踏板位置，255 为 kickdown
    pub fn position(self) -> u8 {
        match self {
            Throttle::Pedal(value) => value,
            Throttle::Kickdown => u8::MAX,
        }
    }
}

/// 空调出风分布
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlowerDistribution {
    pub windshield: bool,
    pub center: bool,
    pub footwell: bool,
}

/// 空调出风模式（0x2E6 Byte 0-2）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlowerMode {
    #[default]
    Auto,
    Manual(BlowerDistribution),
}

impl BlowerMode {
    /// 按位组合：0x01 挡风玻璃，0x02 中间，0x04 脚部，AUTO 为 0
    pub fn bits(self) -> u8 {
        match self {
            BlowerMode::Auto => 0,
            BlowerMode::Manual(d) => {
                (d.windshield as u8) | ((d.center as u8) << 1) | ((d.footwell as u8) << 2)
            },
        }
    }
}

/// 车窗 / 车门位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Corner {
    DriverFront,
    PassengerFront,
    DriverRear,
    PassengerRear,
}

impl Corner {
    pub const ALL: [Corner; 4] = [
        Corner::DriverFront,
        Corner::PassengerFront,
        Corner::DriverRear,
        Corner::PassengerRear,
    ];

    /// 对应的掩码位
    pub fn mask(self) -> DoorMask {
        match self {
            Corner::DriverFront => DoorMask::DRIVER_FRONT,
            Corner::PassengerFront => DoorMask::PASSENGER_FRONT,
            Corner::DriverRear => DoorMask::DRIVER_REAR,
            Corner::PassengerRear => DoorMask::PASSENGER_REAR,
        }
    }
}

/// 车门 / 车窗选择掩码（可按位组合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct DoorMask(u8);

/// 车窗选择掩码与车门掩码使用同一组位
pub type WindowMask = DoorMask;

impl DoorMask {
    pub const NONE: DoorMask = DoorMask(0x00);
    pub const DRIVER_FRONT: DoorMask = DoorMask(0x01);
    pub const PASSENGER_FRONT: DoorMask = DoorMask(0x02);
    pub const DRIVER_REAR: DoorMask = DoorMask(0x04);
    pub const PASSENGER_REAR: DoorMask = DoorMask(0x08);
    pub const ALL: DoorMask = DoorMask(0x0F);

    /// 从原始位构造（高 4 位忽略）
    pub fn from_bits(bits: u8) -> Self {
        DoorMask(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, corner: Corner) -> bool {
        self.0 & corner.mask().0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for DoorMask {
    type Output = DoorMask;

    fn bitor(self, rhs: DoorMask) -> DoorMask {
        DoorMask(self.0 | rhs.0)
    }
}

/// 方向盘按键
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteeringButton {
    Siri,
    Channel,
    Custom,
    Phone,
    VolumeDown,
    VolumeUp,
    Next,
    Prev,
}

// ============================================================================
// 位域结构体
// ============================================================================

/// 方向盘按键位域（0x1D6 Byte 0-1，Motorola 大端组合为 u16）
///
/// 组合后的 u16 按 LSB first 排列：
/// - Bit 0: Siri
/// - Bit 4: 频道
/// - Bit 6: 自定义键
/// - Bit 8: 电话
/// - Bit 10: 音量减
/// - Bit 11: 音量加
/// - Bit 12: 下一曲
/// - Bit 13: 上一曲
/// - 其余位保留
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq)]
pub struct SteeringButtons {
    pub siri: bool,        // Bit 0
    pub reserved_1: u3,    // Bit 1-3
    pub channel: bool,     // Bit 4
    pub reserved_2: u1,    // Bit 5
    pub custom: bool,      // Bit 6
    pub reserved_3: u1,    // Bit 7
    pub phone: bool,       // Bit 8
    pub reserved_4: u1,    // Bit 9
    pub volume_down: bool, // Bit 10
    pub volume_up: bool,   // Bit 11
    pub next: bool,        // Bit 12
    pub prev: bool,        // Bit 13
    pub reserved_5: u2,    // Bit 14-15
}

impl SteeringButtons {
    pub fn is_pressed(&self, button: SteeringButton) -> bool {
        match button {
            SteeringButton::Siri => self.siri(),
            SteeringButton::Channel => self.channel(),
            SteeringButton::Custom => self.custom(),
            SteeringButton::Phone => self.phone(),
            SteeringButton::VolumeDown => self.volume_down(),
            SteeringButton::VolumeUp => self.volume_up(),
            SteeringButton::Next => self.next(),
            SteeringButton::Prev => self.prev(),
        }
    }
}

/// 各车门开关位域（0x2FC Byte 1）
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, Default, PartialEq)]
pub struct DoorBits {
    pub driver_front: bool,    // Bit 0
    pub reserved_1: u1,        // Bit 1
    pub passenger_front: bool, // Bit 2
    pub reserved_2: u1,        // Bit 3
    pub driver_rear: bool,     // Bit 4
    pub reserved_3: u1,        // Bit 5
    pub passenger_rear: bool,  // Bit 6
    pub reserved_4: u1,        // Bit 7
}

impl DoorBits {
    pub fn is_open(&self, corner: Corner) -> bool {
        match corner {
            Corner::DriverFront => self.driver_front(),
            Corner::PassengerFront => self.passenger_front(),
            Corner::DriverRear => self.driver_rear(),
            Corner::PassengerRear => self.passenger_rear(),
        }
    }
}

// ============================================================================
// 解码结果
// ============================================================================

/// 单帧解码结果（部分状态更新）
///
/// `None` 表示该字段因载荷过短未被解码，应用时保持原值。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Feedback {
    /// 0x0A8
    BrakeTorque {
        braking: Option<bool>,
        torque_nm: Option<f32>,
    },
    /// 0x0AA
    Engine {
        throttle: Option<Throttle>,
        rpm: Option<u16>,
    },
    /// 0x0C8
    SteeringAngle { degrees: Option<f32> },
    /// 0x0E2
    CentralLocking { locked: Option<bool> },
    /// 0x0E6
    DoorSummary { any_open: Option<bool> },
    /// 0x0F6
    Mirrors { retracted: Option<bool> },
    /// 0x130
    Key { state: Option<KeyState> },
    /// 0x1A1
    Speed { mph: Option<f32> },
    /// 0x1B4
    ParkingBrake { engaged: Option<bool> },
    /// 0x1D0
    Coolant { celsius: Option<i8> },
    /// 0x1D6
    Buttons { buttons: Option<SteeringButtons> },
    /// 0x1E1
    DriverDoor { open: Option<bool> },
    /// 0x242
    AcStatus {
        ac_active: Option<bool>,
        fan_on: Option<bool>,
    },
    /// 0x286
    DomeLight { brightness: Option<u8> },
    /// 0x2B2
    BrakePressure { level: Option<u8> },
    /// 0x2E6
    ClimateDriver {
        blower: Option<BlowerMode>,
        fan_speed: Option<u8>,
        temp_c: Option<i8>,
    },
    /// 0x2EA
    ClimatePassenger { temp_c: Option<i8> },
    /// 0x2F1
    SeatBelt { plugged: Option<bool> },
    /// 0x2FC
    Doors { bits: Option<DoorBits> },
    /// 0x304
    Gear { position: Option<GearPosition> },
    /// 0x330
    OdometerFuel {
        odometer_km: Option<u32>,
        fuel_l: Option<u8>,
        range_km: Option<f32>,
    },
    /// 0x3B4
    BatteryEngine {
        voltage: Option<f32>,
        engine_flag: Option<bool>,
    },
    /// 0x3B6-0x3B9
    WindowPosition {
        window: Corner,
        position: Option<u8>,
    },
}

/// 解码规则
pub struct DecodeRule {
    /// CAN ID
    pub id: u32,
    /// 规则名称（日志用）
    pub name: &'static str,
    /// 所有字段都能解码所需的最小载荷长度，低于该长度为部分解码
    pub full_len: usize,
    /// 纯解码函数
    pub decode: fn(&[u8]) -> Feedback,
}

impl std::fmt::Debug for DecodeRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeRule")
            .field("id", &format_args!("0x{:03X}", self.id))
            .field("name", &self.name)
            .field("full_len", &self.full_len)
            .finish()
    }
}

impl DecodeRule {
    pub const fn new(
        id: u32,
        name: &'static str,
        full_len: usize,
        decode: fn(&[u8]) -> Feedback,
    ) -> Self {
        Self {
            id,
            name,
            full_len,
            decode,
        }
    }

    /// 载荷不足以解码全部字段
    pub fn is_partial(&self, len: usize) -> bool {
        len < self.full_len
    }
}

/// 静态规则表（按 ID 升序）
pub static DECODE_RULES: &[DecodeRule] = &[
    DecodeRule::new(ID_BRAKE_TORQUE, "brake_torque", 3, decode_brake_torque),
    DecodeRule::new(ID_ENGINE_RPM_THROTTLE, "engine", 7, decode_engine),
    DecodeRule::new(
        ID_STEERING_ANGLE,
        "steering_angle",
        2,
        decode_steering_angle,
    ),
    DecodeRule::new(
        ID_CENTRAL_LOCKING,
        "central_locking",
        1,
        decode_central_locking,
    ),
    DecodeRule::new(ID_DOOR_STATUS, "door_summary", 3, decode_door_summary),
    DecodeRule::new(ID_MIRRORS, "mirrors", 1, decode_mirrors),
    DecodeRule::new(ID_KEY_STATE, "key_state", 1, decode_key_state),
    DecodeRule::new(ID_VEHICLE_SPEED, "speed", 4, decode_speed),
    DecodeRule::new(ID_PARKING_BRAKE, "parking_brake", 6, decode_parking_brake),
    DecodeRule::new(ID_ENGINE_TEMP, "coolant", 1, decode_coolant),
    DecodeRule::new(
        ID_STEERING_BUTTONS,
        "steering_buttons",
        2,
        decode_steering_buttons,
    ),
    DecodeRule::new(ID_DRIVER_DOOR, "driver_door", 3, decode_driver_door),
    DecodeRule::new(ID_AC_STATUS, "ac_status", 3, decode_ac_status),
    DecodeRule::new(ID_DOME_LIGHT, "dome_light", 2, decode_dome_light),
    DecodeRule::new(
        ID_BRAKE_PRESSURE,
        "brake_pressure",
        1,
        decode_brake_pressure,
    ),
    DecodeRule::new(
        ID_CLIMATE_DRIVER,
        "climate_driver",
        8,
        decode_climate_driver,
    ),
    DecodeRule::new(
        ID_CLIMATE_PASSENGER,
        "climate_passenger",
        8,
        decode_climate_passenger,
    ),
    DecodeRule::new(ID_SEAT_BELT, "seat_belt", 3, decode_seat_belt),
    DecodeRule::new(ID_DOOR_BITS, "doors", 2, decode_doors),
    DecodeRule::new(ID_GEAR, "gear", 1, decode_gear),
    DecodeRule::new(ID_ODOMETER_FUEL, "odometer_fuel", 8, decode_odometer_fuel),
    DecodeRule::new(
        ID_BATTERY_ENGINE,
        "battery_engine",
        3,
        decode_battery_engine,
    ),
    DecodeRule::new(
        ID_WINDOW_DRIVER_FRONT,
        "window_driver_front",
        1,
        decode_window_driver_front,
    ),
    DecodeRule::new(
        ID_WINDOW_DRIVER_REAR,
        "window_driver_rear",
        1,
        decode_window_driver_rear,
    ),
    DecodeRule::new(
        ID_WINDOW_PASSENGER_FRONT,
        "window_passenger_front",
        1,
        decode_window_passenger_front,
    ),
    DecodeRule::new(
        ID_WINDOW_PASSENGER_REAR,
        "window_passenger_rear",
        1,
        decode_window_passenger_rear,
    ),
];

/// 按 ID 查找解码规则
pub fn rule_for(id: u32) -> Option<&'static DecodeRule> {
    DECODE_RULES
        .binary_search_by_key(&id, |rule| rule.id)
        .ok()
        .map(|index| &DECODE_RULES[index])
}

/// 解码单帧；未知 ID 返回 `None`
pub fn decode(frame: &RawFrame) -> Option<Feedback> {
    rule_for(frame.id).map(|rule| (rule.decode)(frame.data_slice()))
}

// ============================================================================
// 解码函数
// ============================================================================

fn byte(data: &[u8], index: usize) -> Option<u8> {
    data.get(index).copied()
}

fn decode_brake_torque(data: &[u8]) -> Feedback {
    Feedback::BrakeTorque {
        braking: byte(data, 1).map(|b| nibble(b, 1) == 6),
        torque_nm: u16_le(data, 1).map(|raw| raw as i16 as f32 / TORQUE_DIVISOR),
    }
}

fn decode_engine(data: &[u8]) -> Feedback {
    let throttle = u16_le(data, 2).map(|raw| {
        if byte(data, 6) == Some(THROTTLE_KICKDOWN_MARKER) {
            Throttle::Kickdown
        } else if raw <= THROTTLE_RAW_IDLE {
            Throttle::Pedal(0)
        } else {
            // 先扩展到 u32 再乘，避免溢出
            let scaled = (raw - THROTTLE_RAW_IDLE) as u32 * THROTTLE_MAX as u32 / THROTTLE_RAW_SPAN;
            Throttle::Pedal(scaled.min(THROTTLE_MAX as u32) as u8)
        }
    });

    Feedback::Engine {
        throttle,
        rpm: u16_le(data, 4).map(|raw| raw / RPM_DIVISOR),
    }
}

fn decode_steering_angle(data: &[u8]) -> Feedback {
    Feedback::SteeringAngle {
        degrees: u16_le(data, 0)
            .map(|raw| twos_complement_16(raw, STEERING_SIGN_THRESHOLD) as f32 / STEERING_DIVISOR),
    }
}

fn decode_central_locking(data: &[u8]) -> Feedback {
    Feedback::CentralLocking {
        locked: byte(data, 0).map(|b| b == 0x02),
    }
}

fn decode_door_summary(data: &[u8]) -> Feedback {
    Feedback::DoorSummary {
        any_open: byte(data, 2).map(|b| b == 0xFD),
    }
}

fn decode_mirrors(data: &[u8]) -> Feedback {
    Feedback::Mirrors {
        retracted: byte(data, 0).map(|b| b == 0xF3),
    }
}

fn decode_key_state(data: &[u8]) -> Feedback {
    Feedback::Key {
        state: byte(data, 0).map(KeyState::from),
    }
}

fn decode_speed(data: &[u8]) -> Feedback {
    Feedback::Speed {
        mph: u16_le(data, 2).map(|raw| raw as f32 / SPEED_DIVISOR),
    }
}

fn decode_parking_brake(data: &[u8]) -> Feedback {
    Feedback::ParkingBrake {
        engaged: byte(data, 5).map(|b| b == 0x32),
    }
}

fn decode_coolant(data: &[u8]) -> Feedback {
    Feedback::Coolant {
        celsius: byte(data, 0).map(|b| {
            (b as i16 - COOLANT_OFFSET).clamp(i8::MIN as i16, i8::MAX as i16) as i8
        }),
    }
}

fn decode_steering_buttons(data: &[u8]) -> Feedback {
    Feedback::Buttons {
        buttons: u16_be(data, 0).map(SteeringButtons::from),
    }
}

fn decode_driver_door(data: &[u8]) -> Feedback {
    Feedback::DriverDoor {
        open: byte(data, 2).map(|b| nibble(b, 0) == 1),
    }
}

fn decode_ac_status(data: &[u8]) -> Feedback {
    Feedback::AcStatus {
        ac_active: byte(data, 0).map(|b| bit(b, 0)),
        fan_on: byte(data, 2).map(|b| bit(b, 0)),
    }
}

fn decode_dome_light(data: &[u8]) -> Feedback {
    Feedback::DomeLight {
        brightness: byte(data, 1),
    }
}

/// `min(raw, full_scale) * 255 / full_scale`
fn scale_to_u8(raw: u8, full_scale: u8) -> u8 {
    (raw.min(full_scale) as u16 * u8::MAX as u16 / full_scale as u16) as u8
}

fn decode_brake_pressure(data: &[u8]) -> Feedback {
    Feedback::BrakePressure {
        level: byte(data, 0).map(|b| scale_to_u8(b, BRAKE_PRESSURE_FULL_SCALE)),
    }
}

/// 空调温度：0x20-0x38 线性映射到 16-28°C，超出范围视为无效
fn climate_temp(raw: u8) -> Option<i8> {
    (CLIMATE_TEMP_RAW_MIN..=CLIMATE_TEMP_RAW_MAX)
        .contains(&raw)
        .then(|| CLIMATE_TEMP_BASE_C + ((raw - CLIMATE_TEMP_RAW_MIN) as i16 * 11 / 24) as i8)
}

fn decode_climate_driver(data: &[u8]) -> Feedback {
    let blower = data.get(..3).map(|bytes| {
        if bytes == BLOWER_AUTO_PATTERN {
            return BlowerMode::Auto;
        }
        let distribution = BlowerDistribution {
            windshield: bytes[0] > 0,
            center: bytes[1] > 0,
            footwell: bytes[2] > 0,
        };
        if distribution == BlowerDistribution::default() {
            // 全零视为 AUTO
            BlowerMode::Auto
        } else {
            BlowerMode::Manual(distribution)
        }
    });

    Feedback::ClimateDriver {
        blower,
        fan_speed: byte(data, 5).map(|b| b & 0x07),
        temp_c: byte(data, 7).and_then(climate_temp),
    }
}

fn decode_climate_passenger(data: &[u8]) -> Feedback {
    Feedback::ClimatePassenger {
        temp_c: byte(data, 7).and_then(climate_temp),
    }
}

fn decode_seat_belt(data: &[u8]) -> Feedback {
    Feedback::SeatBelt {
        plugged: byte(data, 2).map(|b| nibble(b, 0) & 0b0001 != 0),
    }
}

fn decode_doors(data: &[u8]) -> Feedback {
    Feedback::Doors {
        bits: byte(data, 1).map(DoorBits::from),
    }
}

fn decode_gear(data: &[u8]) -> Feedback {
    Feedback::Gear {
        position: byte(data, 0).map(GearPosition::from),
    }
}

fn decode_odometer_fuel(data: &[u8]) -> Feedback {
    Feedback::OdometerFuel {
        odometer_km: u24_le(data, 0),
        fuel_l: byte(data, 3),
        range_km: u16_le(data, 6).map(|raw| raw as f32 / RANGE_DIVISOR),
    }
}

fn decode_battery_engine(data: &[u8]) -> Feedback {
    Feedback::BatteryEngine {
        voltage: u16_le(data, 0).map(|raw| {
            ((raw as i32 - BATTERY_RAW_OFFSET) as f32 / BATTERY_DIVISOR)
                .clamp(BATTERY_MIN_V, BATTERY_MAX_V)
        }),
        engine_flag: byte(data, 2).map(|b| b == 0x00),
    }
}

fn window_position(window: Corner, data: &[u8]) -> Feedback {
    Feedback::WindowPosition {
        window,
        position: byte(data, 0).map(|b| scale_to_u8(b, WINDOW_FULL_SCALE)),
    }
}

fn decode_window_driver_front(data: &[u8]) -> Feedback {
    window_position(Corner::DriverFront, data)
}

fn decode_window_driver_rear(data: &[u8]) -> Feedback {
    window_position(Corner::DriverRear, data)
}

fn decode_window_passenger_front(data: &[u8]) -> Feedback {
    window_position(Corner::PassengerFront, data)
}

fn decode_window_passenger_rear(data: &[u8]) -> Feedback {
    window_position(Corner::PassengerRear, data)
}
