use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSensorData {
    pub level: f64,
    pub level_percentage: f64,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSensorResponse {
    pub success: bool,
    pub data: Option<LevelSensorData>,
    #[serde(default)]
    pub update_time: String,
    #[serde(default)]
    pub is_fresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReading {
    pub data: LevelSensorData,
    pub is_fresh: bool,
    pub update_time: String,
}

impl LevelSensorResponse {
    pub fn into_reading(self) -> Option<LevelReading> {
        if !self.success {
            return None;
        }
        self.data.map(|data| LevelReading {
            data,
            is_fresh: self.is_fresh,
            update_time: self.update_time,
        })
    }
}

pub const REFILL_THRESHOLD_PERCENT: f64 = 20.0;
pub const EMPTY_THRESHOLD_PERCENT: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankKind {
    FreshWater,
    BlackWater,
}

impl TankKind {
    pub fn id(self) -> &'static str {
        match self {
            Self::FreshWater => "fresh-water",
            Self::BlackWater => "black-water",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::FreshWater => "Fresh water",
            Self::BlackWater => "Black water",
        }
    }

    pub fn location(self) -> &'static str {
        match self {
            Self::FreshWater => "rear",
            Self::BlackWater => "underbody",
        }
    }

    pub fn status_text(self, level_percentage: f64) -> &'static str {
        match self {
            Self::FreshWater if level_percentage <= REFILL_THRESHOLD_PERCENT => "needs refill",
            Self::BlackWater if level_percentage >= EMPTY_THRESHOLD_PERCENT => "needs emptying",
            _ => "normal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterTank {
    pub id: &'static str,
    pub name: &'static str,
    pub location: &'static str,
    pub capacity_l: f64,
    pub current_level: f64,
    pub level_percentage: f64,
    pub status: &'static str,
    pub is_fresh: bool,
    pub is_stale: bool,
    pub update_time: String,
}

impl WaterTank {
    pub fn from_reading(
        kind: TankKind,
        capacity_l: f64,
        reading: &LevelReading,
        is_stale: bool,
    ) -> Self {
        Self {
            id: kind.id(),
            name: kind.name(),
            location: kind.location(),
            capacity_l,
            current_level: reading.data.level,
            level_percentage: reading.data.level_percentage,
            status: kind.status_text(reading.data.level_percentage),
            is_fresh: reading.is_fresh,
            is_stale,
            update_time: reading.update_time.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(percentage: f64) -> LevelReading {
        LevelReading {
            data: LevelSensorData {
                level: 48.2,
                level_percentage: percentage,
                timestamp: String::new(),
            },
            is_fresh: true,
            update_time: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn fresh_water_needs_refill_at_threshold() {
        assert_eq!(TankKind::FreshWater.status_text(20.0), "needs refill");
        assert_eq!(TankKind::FreshWater.status_text(20.5), "normal");
    }

    #[test]
    fn black_water_needs_emptying_at_threshold() {
        assert_eq!(TankKind::BlackWater.status_text(80.0), "needs emptying");
        assert_eq!(TankKind::BlackWater.status_text(79.9), "normal");
    }

    #[test]
    fn tank_summary_carries_sensor_freshness() {
        let tank = WaterTank::from_reading(TankKind::FreshWater, 100.0, &reading(65.0), false);
        assert_eq!(tank.id, "fresh-water");
        assert_eq!(tank.status, "normal");
        assert!(tank.is_fresh);
        assert!(!tank.is_stale);
    }

    #[test]
    fn unsuccessful_response_has_no_reading() {
        let raw = r#"{"success": false, "data": null, "updateTime": "", "isFresh": false}"#;
        let response: LevelSensorResponse = serde_json::from_str(raw).unwrap();
        assert!(response.into_reading().is_none());

        let raw = r#"{
            "success": true,
            "data": {"level": 50.1, "levelPercentage": 66.0, "timestamp": "t"},
            "updateTime": "u", "isFresh": true
        }"#;
        let response: LevelSensorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_reading().map(|r| r.data.level_percentage), Some(66.0));
    }
}
