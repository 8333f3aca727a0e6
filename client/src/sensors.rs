use std::time::Duration;

use async_trait::async_trait;

use rvdash_common::{
    sensor::{LevelReading, LevelSensorResponse, TankKind, WaterTank},
    LevelSensorConfig,
};

use crate::{
    clock::Clock,
    error::RemoteError,
    remote::{fetch, RemoteSource, SharedRemote},
    snapshot_cache::{DomainSource, SnapshotCache},
};

pub struct LevelSensorSource {
    kind: TankKind,
    path: String,
}

impl LevelSensorSource {
    pub fn new(kind: TankKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

#[async_trait]
impl DomainSource for LevelSensorSource {
    type Value = LevelReading;

    fn name(&self) -> &'static str {
        self.kind.id()
    }

    async fn fetch(
        &self,
        remote: &dyn RemoteSource,
        timeout: Duration,
    ) -> Result<LevelReading, RemoteError> {
        let response: LevelSensorResponse = fetch(remote, &self.path, timeout).await?;
        response.into_reading().ok_or_else(|| RemoteError::Rejected {
            path: self.path.clone(),
            message: "sensor reported no reading".to_string(),
        })
    }
}

pub type LevelSensorCache = SnapshotCache<LevelSensorSource>;

struct Tank {
    kind: TankKind,
    capacity_l: f64,
    cache: LevelSensorCache,
}

impl Tank {
    fn summary(&self) -> Option<WaterTank> {
        let view = self.cache.view();
        view.data.as_ref().map(|reading| {
            WaterTank::from_reading(self.kind, self.capacity_l, reading, view.is_stale)
        })
    }
}

pub struct WaterTanks {
    tanks: Vec<Tank>,
}

impl WaterTanks {
    pub fn new(
        remote: SharedRemote,
        fresh_water: &LevelSensorConfig,
        black_water: &LevelSensorConfig,
        timeout: Duration,
        clock: Clock,
    ) -> Self {
        let tanks = [
            (TankKind::FreshWater, fresh_water),
            (TankKind::BlackWater, black_water),
        ]
        .into_iter()
        .filter_map(|(kind, config)| {
            let path = config.path.as_ref()?;
            Some(Tank {
                kind,
                capacity_l: config.capacity_l,
                cache: SnapshotCache::new(
                    LevelSensorSource::new(kind, path.clone()),
                    remote.clone(),
                    config.cache.clone(),
                    timeout,
                    clock,
                ),
            })
        })
        .collect();
        Self { tanks }
    }

    pub fn sensor(&self, kind: TankKind) -> Option<&LevelSensorCache> {
        self.tanks
            .iter()
            .find(|tank| tank.kind == kind)
            .map(|tank| &tank.cache)
    }

    pub fn sensors(&self) -> impl Iterator<Item = &LevelSensorCache> {
        self.tanks.iter().map(|tank| &tank.cache)
    }

    pub fn tanks(&self) -> Vec<WaterTank> {
        self.tanks.iter().filter_map(Tank::summary).collect()
    }

    pub fn start(&self) {
        self.sensors().for_each(SnapshotCache::start);
    }

    pub fn stop(&self) {
        self.sensors().for_each(SnapshotCache::stop);
    }
}
