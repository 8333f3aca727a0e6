use std::{sync::Arc, time::Duration};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use tracing::{info, warn};

use rvdash_common::{
    endpoints::{PATH_DEVICES, PATH_ROOMS},
    DeviceConfig, RoomsResponse,
};

use crate::{
    error::RemoteError,
    remote::{fetch, SharedRemote},
};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    pub rooms: RoomsResponse,
    pub devices: Vec<DeviceConfig>,
}

type LoadFuture = Shared<BoxFuture<'static, Result<Arc<Topology>, RemoteError>>>;

#[derive(Default)]
struct LoadState {
    generation: u64,
    load: Option<LoadFuture>,
    topology: Option<Arc<Topology>>,
}

// A failed load stays memoized until reload_configs.
#[derive(Clone)]
pub struct ConfigCache {
    remote: SharedRemote,
    timeout: Duration,
    state: Arc<Mutex<LoadState>>,
}

impl ConfigCache {
    pub fn new(remote: SharedRemote, timeout: Duration) -> Self {
        Self {
            remote,
            timeout,
            state: Arc::new(Mutex::new(LoadState::default())),
        }
    }

    pub async fn load_configs(&self) -> Result<Arc<Topology>, RemoteError> {
        let load = {
            let mut state = self.state.lock();
            match &state.load {
                Some(load) => load.clone(),
                None => {
                    let load = self.begin_load(state.generation);
                    state.load = Some(load.clone());
                    load
                }
            }
        };
        load.await
    }

    fn begin_load(&self, generation: u64) -> LoadFuture {
        let remote = Arc::clone(&self.remote);
        let state = Arc::clone(&self.state);
        let timeout = self.timeout;

        async move {
            info!("loading room and device topology");
            let fetched = futures::try_join!(
                fetch::<RoomsResponse>(remote.as_ref(), PATH_ROOMS, timeout),
                fetch::<Vec<DeviceConfig>>(remote.as_ref(), PATH_DEVICES, timeout),
            );
            let (rooms, devices) = match fetched {
                Ok(both) => both,
                Err(err) => {
                    warn!("topology load failed: {err}");
                    return Err(err);
                }
            };

            info!(
                rooms = rooms.rooms.len(),
                devices = devices.len(),
                "topology loaded"
            );
            let topology = Arc::new(Topology { rooms, devices });
            let mut state = state.lock();
            // A reload issued while this fetch was in flight owns the cache now.
            if state.generation == generation {
                state.topology = Some(Arc::clone(&topology));
            }
            Ok(topology)
        }
        .boxed()
        .shared()
    }

    pub async fn rooms(&self) -> Result<RoomsResponse, RemoteError> {
        Ok(self.load_configs().await?.rooms.clone())
    }

    pub async fn devices(&self) -> Result<Vec<DeviceConfig>, RemoteError> {
        Ok(self.load_configs().await?.devices.clone())
    }

    pub fn topology_sync(&self) -> Option<Arc<Topology>> {
        self.state.lock().topology.clone()
    }

    pub fn rooms_sync(&self) -> Option<RoomsResponse> {
        self.topology_sync().map(|topology| topology.rooms.clone())
    }

    pub fn devices_sync(&self) -> Option<Vec<DeviceConfig>> {
        self.topology_sync().map(|topology| topology.devices.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().topology.is_some()
    }

    pub async fn reload_configs(&self) -> Result<Arc<Topology>, RemoteError> {
        {
            let mut state = self.state.lock();
            state.generation += 1;
            state.load = None;
            state.topology = None;
        }
        info!("topology reload requested");
        self.load_configs().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{transport_down, FakeRemote};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_millis(5_000);

    fn script(remote: &FakeRemote) {
        remote.respond_after(
            PATH_ROOMS,
            json!({"rooms": [{"name": "Galley", "buttons": [
                {"buttonId": "b1", "deviceId": "d1", "name": "Ceiling"}
            ]}]}),
            Duration::from_millis(40),
        );
        remote.respond_after(
            PATH_DEVICES,
            json!([{"id": "d1", "name": "Relay board", "type": "relay",
                    "buttons": [{"id": "b1", "name": "Ceiling", "relayIndex": 0}]}]),
            Duration::from_millis(40),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_loads_share_one_round_trip() {
        let remote = FakeRemote::new();
        script(&remote);
        let cache = ConfigCache::new(remote.clone(), TIMEOUT);

        let (a, b, c) = tokio::join!(cache.load_configs(), cache.load_configs(), cache.devices());

        assert_eq!(remote.calls(PATH_ROOMS), 1);
        assert_eq!(remote.calls(PATH_DEVICES), 1);
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
        assert_eq!(c.unwrap()[0].buttons[0].relay_index, 0);

        cache.load_configs().await.unwrap();
        assert_eq!(remote.calls(PATH_ROOMS), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sync_accessors_never_fetch() {
        let remote = FakeRemote::new();
        script(&remote);
        let cache = ConfigCache::new(remote.clone(), TIMEOUT);

        assert_eq!(cache.rooms_sync(), None);
        assert_eq!(cache.devices_sync(), None);
        assert_eq!(remote.calls(PATH_ROOMS), 0);

        cache.load_configs().await.unwrap();
        assert_eq!(cache.rooms_sync().unwrap().rooms[0].name, "Galley");
        assert!(cache.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reaches_every_awaiter_and_is_not_retried() {
        let remote = FakeRemote::new();
        script(&remote);
        remote.fail(PATH_DEVICES, transport_down());
        let cache = ConfigCache::new(remote.clone(), TIMEOUT);

        let (a, b) = tokio::join!(cache.load_configs(), cache.rooms());
        assert_eq!(a.unwrap_err(), transport_down());
        assert_eq!(b.unwrap_err(), transport_down());
        assert!(!cache.is_loaded());

        assert!(cache.load_configs().await.is_err());
        assert_eq!(remote.calls(PATH_DEVICES), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_refetches_after_failure() {
        let remote = FakeRemote::new();
        script(&remote);
        remote.fail(PATH_DEVICES, transport_down());
        let cache = ConfigCache::new(remote.clone(), TIMEOUT);
        assert!(cache.load_configs().await.is_err());

        script(&remote);
        let topology = cache.reload_configs().await.unwrap();
        assert_eq!(topology.devices.len(), 1);
        assert_eq!(remote.calls(PATH_DEVICES), 2);
        assert!(cache.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_load_does_not_overwrite_reloaded_cache() {
        let remote = FakeRemote::new();
        script(&remote);
        let cache = ConfigCache::new(remote.clone(), TIMEOUT);

        let stale = cache.load_configs();
        let reload = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            remote.respond(PATH_ROOMS, json!({"rooms": []}));
            remote.respond(PATH_DEVICES, json!([]));
            cache.reload_configs().await
        };
        let (stale, fresh) = tokio::join!(stale, reload);

        assert_eq!(stale.unwrap().devices.len(), 1);
        assert!(fresh.unwrap().devices.is_empty());
        assert_eq!(cache.devices_sync(), Some(Vec::new()));
    }
}
