use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use rvdash_common::{
    endpoints::{device_input_state, device_online_status, device_relay_state, relay_command},
    status::{ButtonIndexEntry, OnlineStatusView, RelayStatesView},
    types::OnlineStatus,
    ButtonState, ButtonStatus, DeviceStatusTable, DeviceStatusView, RelayStates,
    StatusCacheConfig, SwitchAction,
};

use crate::{
    clock::Clock,
    config_cache::{ConfigCache, Topology},
    error::RemoteError,
    fanout::{Notifier, Subscription},
    remote::{command, fetch, SharedRemote, Write},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceObservation {
    pub device_id: String,
    pub is_online: bool,
    pub relay_states: RelayStates,
    pub changed: bool,
}

struct Inner {
    remote: SharedRemote,
    config: ConfigCache,
    settings: StatusCacheConfig,
    timeout: Duration,
    clock: Clock,
    table: Mutex<DeviceStatusTable>,
    indexed: Mutex<Option<Arc<Topology>>>,
    notifier: Notifier,
    observations: broadcast::Sender<DeviceObservation>,
    ready: AtomicBool,
    poller: Mutex<Option<JoinHandle<()>>>,
}

struct InFlight<'a> {
    table: &'a Mutex<DeviceStatusTable>,
    device_id: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.table.lock().end_refresh(self.device_id);
    }
}

#[derive(Clone)]
pub struct DeviceStatusCache {
    inner: Arc<Inner>,
}

impl DeviceStatusCache {
    pub fn new(
        remote: SharedRemote,
        config: ConfigCache,
        settings: StatusCacheConfig,
        timeout: Duration,
        clock: Clock,
    ) -> Self {
        let (observations, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                remote,
                config,
                table: Mutex::new(DeviceStatusTable::new(settings.ttl_ms)),
                indexed: Mutex::new(None),
                notifier: Notifier::new(
                    "device-status",
                    Duration::from_millis(settings.notify_debounce_ms),
                ),
                settings,
                timeout,
                clock,
                observations,
                ready: AtomicBool::new(false),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self) {
        let cache = self.clone();
        let handle = tokio::spawn(async move { cache.run().await });
        if let Some(previous) = self.inner.poller.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = self.inner.poller.lock().take() {
            handle.abort();
            info!("device status polling stopped");
        }
    }

    async fn run(self) {
        match self.bootstrap().await {
            Ok(0) => {
                warn!("no relay devices configured, status polling disabled");
                return;
            }
            Ok(devices) => info!(devices, "device status polling started"),
            Err(err) => {
                warn!("device status bootstrap failed: {err}");
                return;
            }
        }

        let mut interval =
            tokio::time::interval(Duration::from_millis(self.inner.settings.poll_interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval.tick().await;
        loop {
            interval.tick().await;
            self.refresh_all_devices().await;
        }
    }

    pub async fn bootstrap(&self) -> Result<usize, RemoteError> {
        let topology = self.inner.config.load_configs().await?;
        self.sync_index(&topology);
        if topology.devices.is_empty() {
            return Ok(0);
        }

        self.refresh_all_devices().await;
        self.inner.ready.store(true, Ordering::Release);
        Ok(topology.devices.len())
    }

    // Reindexes buttons whenever the config cache hands out a different topology.
    fn sync_index(&self, topology: &Arc<Topology>) {
        let mut indexed = self.inner.indexed.lock();
        if indexed
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, topology))
        {
            return;
        }
        let buttons = self.inner.table.lock().rebuild_index(&topology.devices);
        *indexed = Some(Arc::clone(topology));
        debug!(buttons, "button index rebuilt");
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    async fn fetch_device(&self, device_id: &str) -> Result<(bool, RelayStates), RemoteError> {
        let remote = self.inner.remote.as_ref();
        let online_path = device_online_status(device_id);
        let relay_path = device_relay_state(device_id);
        let (online, relays) = futures::try_join!(
            fetch::<OnlineStatus>(remote, &online_path, self.inner.timeout),
            fetch::<RelayStates>(remote, &relay_path, self.inner.timeout),
        )?;
        Ok((online.is_online, relays))
    }

    fn apply(&self, device_id: &str, is_online: bool, relay_states: RelayStates, changed: bool) {
        if changed {
            debug!(device_id, is_online, relays = ?relay_states, "device status changed");
            self.inner.notifier.notify();
        }
        // No receivers is fine.
        let _ = self.inner.observations.send(DeviceObservation {
            device_id: device_id.to_string(),
            is_online,
            relay_states,
            changed,
        });
    }

    pub async fn refresh_device(&self, device_id: &str) {
        if !self.inner.table.lock().begin_refresh(device_id) {
            debug!(device_id, "refresh already in flight");
            return;
        }
        let _in_flight = InFlight {
            table: &self.inner.table,
            device_id,
        };

        let result = self.fetch_device(device_id).await;
        let now_ms = self.inner.clock.now_ms();
        let (is_online, relay_states, changed) = match result {
            Ok((is_online, relay_states)) => {
                let changed = self.inner.table.lock().record_success(
                    device_id,
                    is_online,
                    relay_states.clone(),
                    now_ms,
                );
                (is_online, relay_states, changed)
            }
            Err(err) => {
                warn!(device_id, "device refresh failed: {err}");
                let changed = self.inner.table.lock().record_failure(device_id, now_ms);
                (false, Vec::new(), changed)
            }
        };
        self.apply(device_id, is_online, relay_states, changed);
    }

    pub async fn refresh_all_devices(&self) {
        let topology = match self.inner.config.load_configs().await {
            Ok(topology) => topology,
            Err(err) => {
                warn!("cannot refresh devices without topology: {err}");
                return;
            }
        };
        self.sync_index(&topology);
        if topology.devices.is_empty() {
            return;
        }

        debug!(devices = topology.devices.len(), "refreshing all devices");
        let _hold = self.inner.notifier.hold();
        futures::future::join_all(
            topology
                .devices
                .iter()
                .map(|device| self.refresh_device(&device.id)),
        )
        .await;
    }

    pub async fn force_refresh_device(&self, device_id: &str) {
        match self.fetch_device(device_id).await {
            Ok((is_online, relay_states)) => {
                let now_ms = self.inner.clock.now_ms();
                let changed = self.inner.table.lock().record_success(
                    device_id,
                    is_online,
                    relay_states.clone(),
                    now_ms,
                );
                debug!(device_id, is_online, relays = ?relay_states, "forced refresh completed");
                self.apply(device_id, is_online, relay_states, changed);
            }
            Err(err) => warn!(device_id, "forced refresh failed: {err}"),
        }
    }

    pub async fn force_refresh_button(&self, button_id: &str) -> bool {
        let Some(mapping) = self.button_mapping(button_id) else {
            warn!(button_id, "cannot force refresh unknown button");
            return false;
        };
        self.force_refresh_device(&mapping.device_id).await;
        true
    }

    pub fn online_status(&self, device_id: &str) -> OnlineStatusView {
        self.inner
            .table
            .lock()
            .online_status(device_id, self.inner.clock.now_ms())
    }

    pub fn relay_states(&self, device_id: &str) -> RelayStatesView {
        self.inner
            .table
            .lock()
            .relay_states(device_id, self.inner.clock.now_ms())
    }

    pub fn online_status_or_refresh(&self, device_id: &str) -> OnlineStatusView {
        let view = self.online_status(device_id);
        if view.is_stale {
            self.spawn_refresh(device_id);
        }
        view
    }

    pub fn relay_states_or_refresh(&self, device_id: &str) -> RelayStatesView {
        let view = self.relay_states(device_id);
        if view.is_stale {
            self.spawn_refresh(device_id);
        }
        view
    }

    fn spawn_refresh(&self, device_id: &str) {
        let cache = self.clone();
        let device_id = device_id.to_string();
        tokio::spawn(async move { cache.refresh_device(&device_id).await });
    }

    pub fn button_state(&self, button_id: &str) -> ButtonState {
        self.inner
            .table
            .lock()
            .button_state(button_id, self.inner.clock.now_ms())
    }

    pub fn button_online(&self, button_id: &str) -> bool {
        self.inner.table.lock().button_online(button_id)
    }

    pub fn button_mapping(&self, button_id: &str) -> Option<ButtonIndexEntry> {
        self.inner.table.lock().button_mapping(button_id).cloned()
    }

    pub fn buttons_on_device(&self, device_id: &str) -> Vec<(String, usize)> {
        self.inner.table.lock().buttons_on_device(device_id)
    }

    pub fn all_button_states(&self) -> BTreeMap<String, ButtonStatus> {
        self.inner
            .table
            .lock()
            .all_button_states(self.inner.clock.now_ms())
    }

    pub fn all_device_states(&self) -> BTreeMap<String, DeviceStatusView> {
        self.inner
            .table
            .lock()
            .all_device_states(self.inner.clock.now_ms())
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(callback)
    }

    pub fn observe(&self) -> broadcast::Receiver<DeviceObservation> {
        self.inner.observations.subscribe()
    }

    pub async fn set_relay(
        &self,
        device_id: &str,
        relay_index: usize,
        on: bool,
    ) -> Result<(), RemoteError> {
        let path = relay_command(device_id, relay_index, SwitchAction::from_state(on));
        command(
            self.inner.remote.as_ref(),
            &path,
            Write::Post(None),
            self.inner.timeout,
        )
        .await?;
        info!(device_id, relay_index, on, "relay command accepted");
        self.force_refresh_device(device_id).await;
        Ok(())
    }

    pub async fn input_states(&self, device_id: &str) -> Result<RelayStates, RemoteError> {
        fetch(
            self.inner.remote.as_ref(),
            &device_input_state(device_id),
            self.inner.timeout,
        )
        .await
    }
}
