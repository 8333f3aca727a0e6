use crate::types::SwitchAction;

pub const PATH_ROOMS: &str = "/relay/rooms";
pub const PATH_DEVICES: &str = "/relay/devices";

pub const PATH_PMS_RAW_FRAMES: &str = "/battery/raw-can-frames";
pub const PATH_PMS_STATUS: &str = "/battery/pms-status";

pub const PATH_FRESH_WATER_LEVEL: &str = "/sensor/level";

pub const PATH_HEATER_STATUS: &str = "/diesel-heater/status";
pub const PATH_HEATER_CONNECTION_STATUS: &str = "/diesel-heater/connection-status";
pub const PATH_HEATER_CONTROL_STATE: &str = "/diesel-heater/control-state";
pub const PATH_HEATER_HEALTH: &str = "/diesel-heater/health";
pub const PATH_HEATER_TEMPERATURE: &str = "/diesel-heater/temperature";

pub fn device_online_status(device_id: &str) -> String {
    format!("/relay/device/{device_id}/online-status")
}

pub fn device_relay_state(device_id: &str) -> String {
    format!("/relay/device/{device_id}/relay-state")
}

pub fn device_input_state(device_id: &str) -> String {
    format!("/relay/device/{device_id}/input-state")
}

pub fn button_command(button_id: &str, action: SwitchAction) -> String {
    format!("/relay/buttons/{button_id}/{}", action.as_str())
}

pub fn relay_command(device_id: &str, relay_index: usize, action: SwitchAction) -> String {
    format!("/relay/device/{device_id}/{relay_index}/{}", action.as_str())
}

pub fn inverter_command(target: &str, action: &str) -> String {
    format!("/inverter/{target}/{action}")
}

pub fn heater_command(operation: &str) -> String {
    format!("/diesel-heater/{operation}")
}
