//! 车辆状态行（与固件串口输出的格式一致）

use carbus_driver::{IgnitionStatus, VehicleState};
use carbus_protocol::{THROTTLE_MAX, Throttle};
use std::fmt::Write;

pub fn status_line(state: &VehicleState) -> String {
    let ignition = match state.ignition_status() {
        IgnitionStatus::Off => "OFF",
        IgnitionStatus::Second => "SECOND",
        IgnitionStatus::Running => "RUNNING",
    };

    let mut line = format!(
        "Engine {}, Battery: {:.2}V, RPM: {}",
        ignition,
        state.battery_voltage(),
        state.engine_rpm()
    );

    match state.throttle() {
        Throttle::Kickdown => line.push_str(", Throttle: KICKDOWN"),
        Throttle::Pedal(position) => {
            let percent = position as u32 * 100 / THROTTLE_MAX as u32;
            let _ = write!(line, ", Throttle: {}%", percent);
        },
    }

    let _ = write!(
        line,
        ", Steering: {:.1}°, Climate - Fan: {} | Driver: {}C | Passenger: {}C | AC: {}",
        state.steering_angle(),
        state.fan_speed(),
        state.driver_temp_c(),
        state.passenger_temp_c(),
        if state.is_ac_active() { "ON" } else { "OFF" }
    );

    line
}
