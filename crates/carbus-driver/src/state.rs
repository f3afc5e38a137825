//! 车辆状态存储
//!
//! `VehicleState` 只由解码器修改（字段私有，修改入口为 `pub(crate)`），
//! 每帧的更新作为一个整体通过 `ArcSwap` 发布。读取方拿到的快照不可变，
//! 并且总是对应某一帧完整应用之后的状态，不会看到"半帧"。

use arc_swap::ArcSwap;
use carbus_protocol::{
    BlowerMode, Corner, DoorBits, DoorMask, ENGINE_RUNNING_RPM, Feedback, GearPosition, KeyState,
    POWER_DIVISOR, SteeringButton, SteeringButtons, Throttle,
};
use std::sync::Arc;

/// 点火状态（派生值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnitionStatus {
    Off,
    /// 钥匙二档，发动机未运转
    Second,
    Running,
}

/// 车辆状态
///
/// 初始值全部为 0 / `false` / 默认变体；某个 ID 从未出现时对应字段保持初始值，
/// 某帧载荷过短时未解码的字段保持上一次的值。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleState {
    // 动力
    braking: bool,
    torque_nm: f32,
    throttle: Throttle,
    rpm: u16,
    engine_flag: bool,
    key_state: Option<KeyState>,
    coolant_c: i8,
    battery_v: f32,
    gear: GearPosition,

    // 行驶
    speed_mph: f32,
    steering_angle: f32,
    steering_buttons: SteeringButtons,
    parking_brake: bool,
    brake_pressure: u8,
    odometer_km: u32,
    fuel_l: u8,
    range_km: f32,

    // 车身
    door_locked: bool,
    door_open_flag: bool,
    door_bits: DoorBits,
    driver_door_open: bool,
    mirrors_retracted: bool,
    seat_belt_plugged: bool,
    dome_light_brightness: u8,
    /// 按 `Corner` 顺序：驾驶员前、乘客前、驾驶员后、乘客后
    windows: [u8; 4],

    // 空调
    ac_active: bool,
    fan_on: bool,
    fan_speed_raw: u8,
    blower: BlowerMode,
    driver_temp_c: i8,
    passenger_temp_c: i8,

    // 元数据
    last_frame_us: u64,
    frames_applied: u64,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn corner_index(corner: Corner) -> usize {
    match corner {
        Corner::DriverFront => 0,
        Corner::PassengerFront => 1,
        Corner::DriverRear => 2,
        Corner::PassengerRear => 3,
    }
}

impl VehicleState {
    /// 应用一帧的解码结果（仅解码器调用）
    pub(crate) fn apply(&mut self, feedback: &Feedback, timestamp_us: u64) {
        match *feedback {
            Feedback::BrakeTorque { braking, torque_nm } => {
                set(&mut self.braking, braking);
                set(&mut self.torque_nm, torque_nm);
            },
            Feedback::Engine { throttle, rpm } => {
                set(&mut self.throttle, throttle);
                set(&mut self.rpm, rpm);
            },
            Feedback::SteeringAngle { degrees } => set(&mut self.steering_angle, degrees),
            Feedback::CentralLocking { locked } => set(&mut self.door_locked, locked),
            Feedback::DoorSummary { any_open } => set(&mut self.door_open_flag, any_open),
            Feedback::Mirrors { retracted } => set(&mut self.mirrors_retracted, retracted),
            Feedback::Key { state } => {
                // 一旦观察到钥匙帧，之后始终以它为准
                if state.is_some() {
                    self.key_state = state;
                }
            },
            Feedback::Speed { mph } => set(&mut self.speed_mph, mph),
            Feedback::ParkingBrake { engaged } => set(&mut self.parking_brake, engaged),
            Feedback::Coolant { celsius } => set(&mut self.coolant_c, celsius),
            Feedback::Buttons { buttons } => set(&mut self.steering_buttons, buttons),
            Feedback::DriverDoor { open } => set(&mut self.driver_door_open, open),
            Feedback::AcStatus { ac_active, fan_on } => {
                set(&mut self.ac_active, ac_active);
                set(&mut self.fan_on, fan_on);
            },
            Feedback::DomeLight { brightness } => set(&mut self.dome_light_brightness, brightness),
            Feedback::BrakePressure { level } => set(&mut self.brake_pressure, level),
            Feedback::ClimateDriver {
                blower,
                fan_speed,
                temp_c,
            } => {
                set(&mut self.blower, blower);
                set(&mut self.fan_speed_raw, fan_speed);
                set(&mut self.driver_temp_c, temp_c);
            },
            Feedback::ClimatePassenger { temp_c } => set(&mut self.passenger_temp_c, temp_c),
            Feedback::SeatBelt { plugged } => set(&mut self.seat_belt_plugged, plugged),
            Feedback::Doors { bits } => set(&mut self.door_bits, bits),
            Feedback::Gear { position } => set(&mut self.gear, position),
            Feedback::OdometerFuel {
                odometer_km,
                fuel_l,
                range_km,
            } => {
                set(&mut self.odometer_km, odometer_km);
                set(&mut self.fuel_l, fuel_l);
                set(&mut self.range_km, range_km);
            },
            Feedback::BatteryEngine {
                voltage,
                engine_flag,
            } => {
                set(&mut self.battery_v, voltage);
                set(&mut self.engine_flag, engine_flag);
            },
            Feedback::WindowPosition { window, position } => {
                set(&mut self.windows[corner_index(window)], position);
            },
        }

        self.last_frame_us = timestamp_us;
        self.frames_applied += 1;
    }

    // ------------------------------------------------------------------
    // 原始字段访问
    // ------------------------------------------------------------------

    pub fn is_braking(&self) -> bool {
        self.braking
    }

    /// 发动机转速（RPM）
    pub fn engine_rpm(&self) -> u16 {
        self.rpm
    }

    pub fn throttle(&self) -> Throttle {
        self.throttle
    }

    /// 油门位置 0-254，kickdown 为 255
    pub fn throttle_position(&self) -> u8 {
        self.throttle.position()
    }

    /// 0x3B4 中的发动机标志（点火信息的回退来源）
    pub fn engine_flag(&self) -> bool {
        self.engine_flag
    }

    /// 钥匙位置；从未收到 0x130 时为 `None`
    pub fn key_state(&self) -> Option<KeyState> {
        self.key_state
    }

    pub fn coolant_temp_c(&self) -> i8 {
        self.coolant_c
    }

    pub fn battery_voltage(&self) -> f32 {
        self.battery_v
    }

    pub fn gear(&self) -> GearPosition {
        self.gear
    }

    pub fn speed_mph(&self) -> f32 {
        self.speed_mph
    }

    /// 方向盘转角（度，顺时针为正）
    pub fn steering_angle(&self) -> f32 {
        self.steering_angle
    }

    pub fn steering_buttons(&self) -> SteeringButtons {
        self.steering_buttons
    }

    pub fn is_parking_brake_on(&self) -> bool {
        self.parking_brake
    }

    /// 制动压力 0-255
    pub fn brake_pressure(&self) -> u8 {
        self.brake_pressure
    }

    pub fn odometer_km(&self) -> u32 {
        self.odometer_km
    }

    pub fn fuel_level_l(&self) -> u8 {
        self.fuel_l
    }

    pub fn range_km(&self) -> f32 {
        self.range_km
    }

    pub fn is_door_locked(&self) -> bool {
        self.door_locked
    }

    /// 0x0E6 中的车门汇总标志
    pub fn door_open_flag(&self) -> bool {
        self.door_open_flag
    }

    pub fn is_driver_door_open(&self) -> bool {
        self.driver_door_open
    }

    pub fn are_mirrors_retracted(&self) -> bool {
        self.mirrors_retracted
    }

    pub fn is_seat_belt_plugged(&self) -> bool {
        self.seat_belt_plugged
    }

    pub fn dome_light_brightness(&self) -> u8 {
        self.dome_light_brightness
    }

    pub fn is_ac_active(&self) -> bool {
        self.ac_active
    }

    pub fn is_fan_on(&self) -> bool {
        self.fan_on
    }

    pub fn blower(&self) -> BlowerMode {
        self.blower
    }

    pub fn driver_temp_c(&self) -> i8 {
        self.driver_temp_c
    }

    pub fn passenger_temp_c(&self) -> i8 {
        self.passenger_temp_c
    }

    /// 最近一次应用的帧的捕获时间戳（微秒，0 表示尚未收到任何帧）
    pub fn last_frame_us(&self) -> u64 {
        self.last_frame_us
    }

    /// 已应用的帧数
    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    // ------------------------------------------------------------------
    // 派生判断
    // ------------------------------------------------------------------

    /// 发动机是否运转
    ///
    /// 收到过钥匙帧时：钥匙在二档或启动位且转速 > 400；
    /// 否则回退到 0x3B4 的发动机标志且转速 > 400。
    pub fn is_engine_running(&self) -> bool {
        let above_idle = self.rpm > ENGINE_RUNNING_RPM;
        match self.key_state {
            Some(key) => matches!(key, KeyState::Position2 | KeyState::Cranking) && above_idle,
            None => self.engine_flag && above_idle,
        }
    }

    /// 发动机是否正在启动
    pub fn is_engine_cranking(&self) -> bool {
        match self.key_state {
            Some(key) => key == KeyState::Cranking && self.rpm < ENGINE_RUNNING_RPM,
            None => self.engine_flag && self.rpm > 0 && self.rpm < ENGINE_RUNNING_RPM,
        }
    }

    pub fn ignition_status(&self) -> IgnitionStatus {
        if self.rpm > ENGINE_RUNNING_RPM {
            return IgnitionStatus::Running;
        }

        match self.key_state {
            Some(
                KeyState::EngineOff
                | KeyState::Inserting
                | KeyState::Position1
                | KeyState::Unrecognized,
            ) => IgnitionStatus::Off,
            Some(KeyState::Position2 | KeyState::Cranking) => IgnitionStatus::Second,
            None if self.engine_flag => IgnitionStatus::Second,
            None => IgnitionStatus::Off,
        }
    }

    /// 发动机扭矩（N·m），发动机未运转时为 0
    pub fn torque_nm(&self) -> f32 {
        if self.is_engine_running() {
            self.torque_nm
        } else {
            0.0
        }
    }

    /// 发动机功率（kW），发动机未运转时为 0
    pub fn power_kw(&self) -> f32 {
        if !self.is_engine_running() {
            return 0.0;
        }
        self.rpm as f32 * self.torque_nm / POWER_DIVISOR
    }

    /// 风量 0-7
    ///
    /// 总线上风扇关闭时最低也报 1，需要结合 0x242 的风扇开关区分 0 和 1。
    pub fn fan_speed(&self) -> u8 {
        if self.fan_speed_raw == 1 && !self.fan_on {
            0
        } else {
            self.fan_speed_raw
        }
    }

    /// 掩码中任一车门打开；空掩码表示检查所有车门
    pub fn is_door_open(&self, mask: DoorMask) -> bool {
        let mask = if mask.is_empty() { DoorMask::ALL } else { mask };
        Corner::ALL
            .into_iter()
            .any(|corner| mask.contains(corner) && self.door_bits.is_open(corner))
    }

    /// 车窗位置 0（关闭）-255（完全打开）
    pub fn window_position(&self, window: Corner) -> u8 {
        self.windows[corner_index(window)]
    }

    pub fn is_steering_button_pressed(&self, button: SteeringButton) -> bool {
        self.steering_buttons.is_pressed(button)
    }

    /// 顶灯是否打开（亮度 > 50）
    pub fn is_dome_light_on(&self) -> bool {
        self.dome_light_brightness > carbus_protocol::DOME_LIGHT_ON_THRESHOLD
    }
}

/// 状态存储（写端，解码器独占）
pub struct StateStore {
    current: Arc<ArcSwap<VehicleState>>,
}

impl StateStore {
    pub(crate) fn new() -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(VehicleState::default())),
        }
    }

    /// 原子发布完整状态
    pub(crate) fn publish(&self, state: &VehicleState) {
        self.current.store(Arc::new(state.clone()));
    }

    pub fn handle(&self) -> StateHandle {
        StateHandle {
            current: Arc::clone(&self.current),
        }
    }
}

/// 状态读取句柄（可克隆，可跨线程）
#[derive(Clone)]
pub struct StateHandle {
    current: Arc<ArcSwap<VehicleState>>,
}

impl StateHandle {
    /// 获取当前状态快照（无锁）
    pub fn snapshot(&self) -> Arc<VehicleState> {
        self.current.load_full()
    }
}

impl std::fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHandle")
            .field("frames_applied", &self.current.load().frames_applied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbus_protocol::{RawFrame, decode};

    fn apply_bytes(state: &mut VehicleState, id: u16, data: &[u8]) {
        let feedback = decode(&RawFrame::new_standard(id, data)).unwrap();
        state.apply(&feedback, 1);
    }

    fn rpm_bytes(rpm: u16) -> [u8; 6] {
        let raw = (rpm * 4).to_le_bytes();
        [0, 0, 0xFF, 0x00, raw[0], raw[1]]
    }

    #[test]
    fn test_default_state() {
        let state = VehicleState::default();
        assert_eq!(state.engine_rpm(), 0);
        assert_eq!(state.gear(), GearPosition::Unknown);
        assert_eq!(state.key_state(), None);
        assert_eq!(state.ignition_status(), IgnitionStatus::Off);
        assert!(!state.is_engine_running());
        assert_eq!(state.frames_applied(), 0);
    }

    #[test]
    fn test_partial_decode_keeps_previous_values() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x0AA, &[0, 0, 0xFF, 0x00, 0xA0, 0x07]);
        assert_eq!(state.engine_rpm(), 488);

        // 只有油门字段的短帧：转速保持
        apply_bytes(&mut state, 0x0AA, &[0, 0, 0x00, 0x80]);
        assert_eq!(state.engine_rpm(), 488);
        assert!(state.throttle_position() > 0);
    }

    #[test]
    fn test_engine_running_fallback_to_engine_flag() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x0AA, &rpm_bytes(800));
        assert!(!state.is_engine_running());

        apply_bytes(&mut state, 0x3B4, &[0x30, 0xF3, 0x00]);
        assert!(state.is_engine_running());
        assert_eq!(state.ignition_status(), IgnitionStatus::Running);
    }

    #[test]
    fn test_key_state_overrides_engine_flag_once_observed() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x3B4, &[0x30, 0xF3, 0x00]);
        apply_bytes(&mut state, 0x0AA, &rpm_bytes(800));
        assert!(state.is_engine_running());

        // 钥匙在一档：即使发动机标志为真也不算运转
        apply_bytes(&mut state, 0x130, &[0x41]);
        assert!(!state.is_engine_running());

        apply_bytes(&mut state, 0x130, &[0x45]);
        assert!(state.is_engine_running());
    }

    #[test]
    fn test_unrecognized_key_is_conservative() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x3B4, &[0x30, 0xF3, 0x00]);
        apply_bytes(&mut state, 0x130, &[0x99]);
        apply_bytes(&mut state, 0x0AA, &rpm_bytes(200));

        assert_eq!(state.key_state(), Some(KeyState::Unrecognized));
        assert!(!state.is_engine_cranking());
        assert_eq!(state.ignition_status(), IgnitionStatus::Off);
    }

    #[test]
    fn test_cranking_detection() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x3B4, &[0x30, 0xF3, 0x00]);
        apply_bytes(&mut state, 0x0AA, &rpm_bytes(150));
        assert!(state.is_engine_cranking());
        assert_eq!(state.ignition_status(), IgnitionStatus::Second);

        apply_bytes(&mut state, 0x130, &[0x55]);
        assert!(state.is_engine_cranking());

        apply_bytes(&mut state, 0x0AA, &rpm_bytes(900));
        assert!(!state.is_engine_cranking());
        assert!(state.is_engine_running());
    }

    #[test]
    fn test_torque_and_power_zero_when_not_running() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x0A8, &[0, 0x00, 0x19]); // 0x1900 / 32 = 200 N·m
        assert_eq!(state.torque_nm(), 0.0);
        assert_eq!(state.power_kw(), 0.0);

        apply_bytes(&mut state, 0x3B4, &[0x30, 0xF3, 0x00]);
        apply_bytes(&mut state, 0x0AA, &rpm_bytes(3000));
        assert_eq!(state.torque_nm(), 200.0);
        let expected = 3000.0 * 200.0 / 9549.2966;
        assert!((state.power_kw() - expected).abs() < 0.01);
    }

    #[test]
    fn test_fan_speed_uses_fan_on_flag() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x2E6, &[0, 0x64, 0x1E, 0, 0, 0x01]);
        assert_eq!(state.fan_speed(), 0);

        apply_bytes(&mut state, 0x242, &[0x11, 0, 0xF1]);
        assert_eq!(state.fan_speed(), 1);
        assert!(state.is_ac_active());
    }

    #[test]
    fn test_door_mask_queries() {
        let mut state = VehicleState::default();
        assert!(!state.is_door_open(DoorMask::NONE));

        apply_bytes(&mut state, 0x2FC, &[0x00, 0x10]); // 驾驶员后门
        assert!(state.is_door_open(DoorMask::DRIVER_REAR));
        assert!(!state.is_door_open(DoorMask::DRIVER_FRONT | DoorMask::PASSENGER_FRONT));
        assert!(state.is_door_open(DoorMask::NONE));
    }

    #[test]
    fn test_window_positions_indexed_by_corner() {
        let mut state = VehicleState::default();
        apply_bytes(&mut state, 0x3B8, &[0x50]);
        assert_eq!(state.window_position(Corner::PassengerFront), 255);
        assert_eq!(state.window_position(Corner::DriverFront), 0);
    }

    #[test]
    fn test_store_publishes_snapshots() {
        let store = StateStore::new();
        let handle = store.handle();
        let before = handle.snapshot();

        let mut working = VehicleState::default();
        apply_bytes(&mut working, 0x304, &[0xC2]);
        store.publish(&working);

        // 旧快照不受影响
        assert_eq!(before.gear(), GearPosition::Unknown);
        assert_eq!(handle.snapshot().gear(), GearPosition::Reverse);
        assert_eq!(handle.snapshot().frames_applied(), 1);
    }
}
