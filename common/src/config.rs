use serde::{Deserialize, Serialize};

use crate::endpoints::PATH_FRESH_WATER_LEVEL;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCacheConfig {
    pub poll_interval_ms: u64,
    pub ttl_ms: u64,
    pub notify_debounce_ms: u64,
}

impl Default for StatusCacheConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            ttl_ms: 10_000,
            notify_debounce_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotCacheConfig {
    pub poll_interval_ms: u64,
    pub ttl_ms: u64,
    pub notify_debounce_ms: u64,
}

impl SnapshotCacheConfig {
    pub fn pms() -> Self {
        Self {
            poll_interval_ms: 1_000,
            ttl_ms: 3_000,
            notify_debounce_ms: 50,
        }
    }

    pub fn heater() -> Self {
        Self {
            poll_interval_ms: 2_000,
            ttl_ms: 6_000,
            notify_debounce_ms: 50,
        }
    }

    pub fn level_sensor() -> Self {
        Self {
            poll_interval_ms: 5_000,
            ttl_ms: 15_000,
            notify_debounce_ms: 50,
        }
    }

    pub fn weather() -> Self {
        Self {
            poll_interval_ms: 600_000,
            ttl_ms: 600_000,
            notify_debounce_ms: 50,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub settle_ms: u64,
    pub refresh_schedule_ms: Vec<u64>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            settle_ms: 1_000,
            refresh_schedule_ms: vec![0, 500, 1_000],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSensorConfig {
    pub path: Option<String>,
    pub capacity_l: f64,
    #[serde(default = "SnapshotCacheConfig::level_sensor")]
    pub cache: SnapshotCacheConfig,
}

impl LevelSensorConfig {
    pub fn fresh_water() -> Self {
        Self {
            path: Some(PATH_FRESH_WATER_LEVEL.to_string()),
            capacity_l: 100.0,
            cache: SnapshotCacheConfig::level_sensor(),
        }
    }

    pub fn black_water() -> Self {
        Self {
            path: None,
            capacity_l: 80.0,
            cache: SnapshotCacheConfig::level_sensor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    pub endpoint: String,
    pub api_key: String,
    pub location: String,
    pub city: String,
    #[serde(default = "SnapshotCacheConfig::weather")]
    pub cache: SnapshotCacheConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_base: String,
    pub request_timeout_ms: u64,
    pub accept_invalid_certs: bool,
    pub http_port: u16,
    #[serde(default)]
    pub devices: StatusCacheConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default = "SnapshotCacheConfig::pms")]
    pub pms: SnapshotCacheConfig,
    #[serde(default = "SnapshotCacheConfig::heater")]
    pub heater: SnapshotCacheConfig,
    #[serde(default = "LevelSensorConfig::fresh_water")]
    pub fresh_water: LevelSensorConfig,
    #[serde(default = "LevelSensorConfig::black_water")]
    pub black_water: LevelSensorConfig,
    #[serde(default)]
    pub weather: Option<WeatherConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "https://192.168.8.145:3000/v1".to_string(),
            request_timeout_ms: 5_000,
            accept_invalid_certs: true,
            http_port: 8080,
            devices: StatusCacheConfig::default(),
            reconcile: ReconcileConfig::default(),
            pms: SnapshotCacheConfig::pms(),
            heater: SnapshotCacheConfig::heater(),
            fresh_water: LevelSensorConfig::fresh_water(),
            black_water: LevelSensorConfig::black_water(),
            weather: None,
        }
    }
}

// A TTL at or below the poll interval turns ordinary scheduling jitter into staleness.
fn sanitize_freshness(poll_interval_ms: &mut u64, ttl_ms: &mut u64, notify_debounce_ms: &mut u64) {
    *poll_interval_ms = (*poll_interval_ms).max(100);
    if *ttl_ms <= *poll_interval_ms {
        *ttl_ms = *poll_interval_ms * 2;
    }
    *notify_debounce_ms = (*notify_debounce_ms).clamp(1, 1_000);
}

impl StatusCacheConfig {
    pub fn sanitize(&mut self) {
        sanitize_freshness(
            &mut self.poll_interval_ms,
            &mut self.ttl_ms,
            &mut self.notify_debounce_ms,
        );
    }
}

impl SnapshotCacheConfig {
    pub fn sanitize(&mut self) {
        sanitize_freshness(
            &mut self.poll_interval_ms,
            &mut self.ttl_ms,
            &mut self.notify_debounce_ms,
        );
    }
}

impl ReconcileConfig {
    pub fn sanitize(&mut self) {
        if self.settle_ms == 0 {
            self.settle_ms = 1_000;
        }
        self.refresh_schedule_ms.sort_unstable();
        self.refresh_schedule_ms.dedup();
    }
}

impl ClientConfig {
    pub fn sanitize(&mut self) {
        let trimmed = self.api_base.trim_end_matches('/').len();
        self.api_base.truncate(trimmed);
        if self.request_timeout_ms == 0 {
            self.request_timeout_ms = 5_000;
        }
        self.devices.sanitize();
        self.reconcile.sanitize();
        self.pms.sanitize();
        self.heater.sanitize();
        self.fresh_water.cache.sanitize();
        self.black_water.cache.sanitize();
        if let Some(weather) = self.weather.as_mut() {
            weather.cache.sanitize();
        }
    }
}
