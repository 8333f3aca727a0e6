use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use rvdash_common::{
    endpoints::{inverter_command, PATH_PMS_RAW_FRAMES, PATH_PMS_STATUS},
    pms::{InverterAction, PmsData, PmsStatus, RawCanFrames},
};

use crate::{
    error::RemoteError,
    remote::{command, fetch, RemoteSource, Write},
    snapshot_cache::{DomainSource, SnapshotCache},
};

pub struct PmsSource;

#[async_trait]
impl DomainSource for PmsSource {
    type Value = PmsData;

    fn name(&self) -> &'static str {
        "pms"
    }

    async fn fetch(
        &self,
        remote: &dyn RemoteSource,
        timeout: Duration,
    ) -> Result<PmsData, RemoteError> {
        let (raw, status) = futures::try_join!(
            fetch::<RawCanFrames>(remote, PATH_PMS_RAW_FRAMES, timeout),
            fetch::<PmsStatus>(remote, PATH_PMS_STATUS, timeout),
        )?;
        Ok(PmsData { raw, status })
    }
}

pub type PmsCache = SnapshotCache<PmsSource>;

impl SnapshotCache<PmsSource> {
    pub fn raw_frames(&self) -> Option<RawCanFrames> {
        self.value().map(|data| data.raw)
    }

    pub fn status(&self) -> Option<PmsStatus> {
        self.value().map(|data| data.status)
    }

    pub async fn set_inverter(
        &self,
        target: &str,
        action: InverterAction,
    ) -> Result<(), RemoteError> {
        let path = inverter_command(target, action.as_str());
        command(self.remote(), &path, Write::Post(None), self.timeout()).await?;
        info!(inverter = target, action = action.as_str(), "inverter command accepted");
        self.force_refresh().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::Clock,
        testing::{transport_down, FakeRemote},
    };
    use rvdash_common::SnapshotCacheConfig;
    use serde_json::json;
    use std::sync::Arc;

    fn script(remote: &FakeRemote, soc: f64) {
        remote.respond(
            PATH_PMS_RAW_FRAMES,
            json!({"DCAC_Status": {"sysStatus": 1, "handSwitch": 0, "tempModule": 30.0,
                   "tempCapOBG": 28.0, "tempCapOBS": 28.5, "relay1": 1, "relay2": 0,
                   "opt1": 0, "opt2": 0, "timestamp": 1}}),
        );
        remote.respond(
            PATH_PMS_STATUS,
            json!({"bms": {"soc": soc, "voltage": 51.2, "current": 4.0, "temperature": 22.0,
                           "faultLevel": 0},
                   "dcac": {"enableDCAC": 0, "systemStatus": 1, "tempModule": 30.0,
                            "relay1": 1, "relay2": 0},
                   "timestamp": 1}),
        );
    }

    fn cache(remote: &Arc<FakeRemote>) -> PmsCache {
        SnapshotCache::new(
            PmsSource,
            remote.clone(),
            SnapshotCacheConfig::pms(),
            Duration::from_millis(5_000),
            Clock::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn combines_frames_and_summary() {
        let remote = FakeRemote::new();
        script(&remote, 76.0);
        let cache = cache(&remote);

        cache.refresh().await;
        assert_eq!(cache.status().map(|s| s.bms.soc), Some(76.0));
        assert_eq!(
            cache.raw_frames().and_then(|f| f.dcac_status()).map(|d| d.relay1),
            Some(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn either_half_failing_fails_the_poll() {
        let remote = FakeRemote::new();
        script(&remote, 76.0);
        remote.fail(PATH_PMS_RAW_FRAMES, transport_down());
        let cache = cache(&remote);

        cache.refresh().await;
        assert!(cache.value().is_none());
        assert!(cache.is_stale());
    }

    #[tokio::test(start_paused = true)]
    async fn inverter_command_refreshes_snapshot() {
        let remote = FakeRemote::new();
        script(&remote, 76.0);
        remote.respond("/inverter/dcac/OPEN", json!({"success": true, "message": "ok"}));
        let cache = cache(&remote);

        cache.set_inverter("dcac", InverterAction::Open).await.unwrap();
        assert_eq!(remote.calls("/inverter/dcac/OPEN"), 1);
        assert_eq!(remote.calls(PATH_PMS_STATUS), 1);
        assert!(cache.status().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn refused_inverter_command_skips_refresh() {
        let remote = FakeRemote::new();
        script(&remote, 76.0);
        remote.respond("/inverter/dcac/CLOSE", json!({"success": false, "message": "locked"}));
        let cache = cache(&remote);

        let result = cache.set_inverter("dcac", InverterAction::Close).await;
        assert!(matches!(result, Err(RemoteError::Rejected { .. })));
        assert_eq!(remote.calls(PATH_PMS_STATUS), 0);
    }
}
