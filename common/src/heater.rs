use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub on: bool,
    pub heating: bool,
    pub has_active_control: bool,
    pub target_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaterStatus {
    pub is_running: bool,
    pub is_heating: bool,
    pub work_status: u8,
    pub work_mode: u8,
    pub ignition_status: u8,
    pub work_status_text: String,
    pub work_mode_text: String,
    pub ignition_status_text: String,
    pub inlet_temperature: f64,
    pub outlet_temperature: f64,
    pub target_temperature: f64,
    pub voltage: f64,
    pub fault_code: u32,
    pub fault_text: String,
    pub last_update_time: String,
    #[serde(default)]
    pub control_state: ControlState,
    #[serde(default)]
    pub connection_status: bool,
    #[serde(default)]
    pub online: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub is_connected: bool,
    #[serde(default)]
    pub control_state: ControlState,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthData {
    pub is_connected: bool,
    pub last_update_time: String,
    pub time_since_last_update: String,
    pub is_online: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureInfo {
    pub inlet_temperature: f64,
    pub outlet_temperature: f64,
    pub target_temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningInfo {
    pub is_running: bool,
    pub is_heating: bool,
    pub work_status_text: String,
    pub work_mode_text: String,
    pub ignition_status_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultInfo {
    pub fault_code: u32,
    pub fault_text: String,
    pub voltage: f64,
}

impl HeaterStatus {
    pub fn last_update(&self) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.last_update_time).ok()
    }

    pub fn temperature_info(&self) -> TemperatureInfo {
        TemperatureInfo {
            inlet_temperature: self.inlet_temperature,
            outlet_temperature: self.outlet_temperature,
            target_temperature: self.target_temperature,
        }
    }

    pub fn running_info(&self) -> RunningInfo {
        RunningInfo {
            is_running: self.is_running,
            is_heating: self.is_heating,
            work_status_text: self.work_status_text.clone(),
            work_mode_text: self.work_mode_text.clone(),
            ignition_status_text: self.ignition_status_text.clone(),
        }
    }

    pub fn fault_info(&self) -> FaultInfo {
        FaultInfo {
            fault_code: self.fault_code,
            fault_text: self.fault_text.clone(),
            voltage: self.voltage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaterOperation {
    StartWithHeating,
    StartWithoutHeating,
    Stop,
    ToggleHeating,
    Connect,
    Disconnect,
}

impl HeaterOperation {
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::StartWithHeating => "start-with-heating",
            Self::StartWithoutHeating => "start-without-heating",
            Self::Stop => "stop",
            Self::ToggleHeating => "toggle-heating",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start-with-heating" => Some(Self::StartWithHeating),
            "start-without-heating" => Some(Self::StartWithoutHeating),
            "stop" => Some(Self::Stop),
            "toggle-heating" => Some(Self::ToggleHeating),
            "connect" => Some(Self::Connect),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }

    pub fn affects_connection(self) -> bool {
        matches!(self, Self::Connect | Self::Disconnect)
    }
}
