use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsSummary {
    pub soc: f64,
    pub voltage: f64,
    pub current: f64,
    pub temperature: f64,
    pub fault_level: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcuSummary {
    pub key_on: bool,
    pub pump_enable: bool,
    pub fan_enable: bool,
    pub fault_code: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcacSummary {
    #[serde(rename = "enableDCAC")]
    pub enable_dcac: u8,
    pub system_status: u8,
    pub temp_module: f64,
    pub relay1: u8,
    pub relay2: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcdcSummary {
    pub run_status: u8,
    pub system_status: u8,
    pub temp_module: f64,
    pub vol_output: f64,
    pub cur_output: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObcSummary {
    pub system_status: u8,
    pub vol_output: f64,
    pub cur_output: f64,
    pub temp_module: f64,
    pub fault_status: u8,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsgSummary {
    pub charge_enable: u8,
    pub system_status: u8,
    pub torque: f64,
    pub speed: f64,
    pub current: f64,
    pub fault_info: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PmsStatus {
    pub bms: BmsSummary,
    #[serde(default)]
    pub vcu: VcuSummary,
    #[serde(default)]
    pub dcac: DcacSummary,
    #[serde(default)]
    pub dcdc: DcdcSummary,
    #[serde(default)]
    pub obc: ObcSummary,
    #[serde(default)]
    pub isg: IsgSummary,
    pub timestamp: u64,
}

impl PmsStatus {
    pub fn has_bms_fault(&self) -> bool {
        self.bms.fault_level > 0
    }

    pub fn inverter_enabled(&self) -> bool {
        self.dcac.enable_dcac == 1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsStatus01 {
    pub hv_power_allow: u8,
    pub hv_power_loop_status: u8,
    pub heating_request: u8,
    pub cooling_request: u8,
    pub dc_chg_status: u8,
    #[serde(rename = "volOutputBMS")]
    pub vol_output_bms: f64,
    #[serde(rename = "curOutputBMS")]
    pub cur_output_bms: f64,
    pub cap_chg2_full: f64,
    pub soc: f64,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcacStatus {
    pub sys_status: u8,
    pub hand_switch: u8,
    pub temp_module: f64,
    #[serde(rename = "tempCapOBG")]
    pub temp_cap_obg: f64,
    #[serde(rename = "tempCapOBS")]
    pub temp_cap_obs: f64,
    pub relay1: u8,
    pub relay2: u8,
    pub opt1: u8,
    pub opt2: u8,
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawCanFrames(pub BTreeMap<String, serde_json::Value>);

impl RawCanFrames {
    pub fn frame<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.0
            .get(name)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn bms_status01(&self) -> Option<BmsStatus01> {
        self.frame("BMS_Status01")
    }

    pub fn dcac_status(&self) -> Option<DcacStatus> {
        self.frame("DCAC_Status")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PmsData {
    pub raw: RawCanFrames,
    pub status: PmsStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InverterAction {
    Open,
    Close,
}

impl InverterAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "CLOSE" => Some(Self::Close),
            _ => None,
        }
    }
}
