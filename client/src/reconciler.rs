use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};
use tracing::{debug, info, warn};

use rvdash_common::{
    endpoints::button_command, types::relay_is_on, CommandLedger, ObserveOutcome,
    ReconcileConfig, SwitchAction,
};

use crate::{
    clock::Clock,
    error::{RemoteError, ToggleOutcome},
    fanout::{Notifier, Subscription},
    remote::{command, SharedRemote, Write},
    status_cache::{DeviceObservation, DeviceStatusCache},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonView {
    pub state: bool,
    pub is_stale: bool,
    pub is_online: bool,
    pub pending_target: Option<bool>,
    pub settles_in_ms: Option<u64>,
    pub loading: bool,
}

struct Inner {
    status: DeviceStatusCache,
    remote: SharedRemote,
    timeout: Duration,
    settings: ReconcileConfig,
    clock: Clock,
    ledger: Mutex<CommandLedger>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    notifier: Notifier,
    listener: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct ButtonReconciler {
    inner: Arc<Inner>,
}

impl ButtonReconciler {
    pub fn new(
        status: DeviceStatusCache,
        remote: SharedRemote,
        settings: ReconcileConfig,
        timeout: Duration,
        clock: Clock,
        notify_debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                status,
                remote,
                timeout,
                ledger: Mutex::new(CommandLedger::new(settings.settle_ms)),
                settings,
                clock,
                timers: Mutex::new(HashMap::new()),
                notifier: Notifier::new("buttons", notify_debounce),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn start(&self) {
        let mut observations = self.inner.status.observe();
        let reconciler = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match observations.recv().await {
                    Ok(observation) => reconciler.on_observation(&observation),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "reconciler fell behind device observations");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.inner.listener.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn shutdown(&self) {
        if let Some(listener) = self.inner.listener.lock().take() {
            listener.abort();
        }
        for (_, timer) in self.inner.timers.lock().drain() {
            timer.abort();
        }
    }

    fn on_observation(&self, observation: &DeviceObservation) {
        let mut updated = false;
        let buttons = self.inner.status.buttons_on_device(&observation.device_id);
        for (button_id, relay_index) in buttons {
            let observed = relay_is_on(&observation.relay_states, relay_index);
            let outcome = self.inner.ledger.lock().observe(&button_id, observed);
            match outcome {
                ObserveOutcome::Confirmed(state) => {
                    info!(button_id, state, "toggle confirmed by poll");
                    self.cancel_timer(&button_id);
                    updated = true;
                }
                ObserveOutcome::Applied(_) => updated = true,
                ObserveOutcome::Held | ObserveOutcome::Unchanged => {}
            }
        }
        if updated {
            self.inner.notifier.notify();
        }
    }

    fn cancel_timer(&self, button_id: &str) {
        if let Some(timer) = self.inner.timers.lock().remove(button_id) {
            timer.abort();
        }
    }

    fn arm_settle_timer(&self, button_id: &str, deadline_ms: u64) {
        let reconciler = self.clone();
        let id = button_id.to_string();
        let deadline = self.inner.clock.instant_at(deadline_ms);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            reconciler.settle(&id);
        });
        if let Some(previous) = self
            .inner
            .timers
            .lock()
            .insert(button_id.to_string(), timer)
        {
            previous.abort();
        }
    }

    fn settle(&self, button_id: &str) {
        let now_ms = self.inner.clock.now_ms();
        let committed = self.inner.ledger.lock().settle(button_id, now_ms);
        self.inner.timers.lock().remove(button_id);
        if let Some(state) = committed {
            info!(button_id, state, "settle window elapsed, committing target");
            self.inner.notifier.notify();
        }
    }

    fn schedule_refreshes(&self, device_id: &str) {
        for delay_ms in self.inner.settings.refresh_schedule_ms.iter().copied() {
            let status = self.inner.status.clone();
            let device_id = device_id.to_string();
            tokio::spawn(async move {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                status.force_refresh_device(&device_id).await;
            });
        }
    }

    pub async fn toggle(
        &self,
        button_id: &str,
        target: bool,
    ) -> Result<ToggleOutcome, RemoteError> {
        let is_online = self.inner.status.button_online(button_id);
        let now_ms = self.inner.clock.now_ms();
        let begun = self
            .inner
            .ledger
            .lock()
            .begin(button_id, target, is_online, now_ms);
        let pending = match begun {
            Ok(pending) => pending,
            Err(rejection) => {
                debug!(button_id, ?rejection, "toggle rejected");
                return Ok(rejection.into());
            }
        };

        info!(button_id, target, "toggle issued");
        self.arm_settle_timer(
            button_id,
            pending.issued_at_ms + self.inner.settings.settle_ms,
        );
        self.inner.notifier.notify();

        let path = button_command(button_id, SwitchAction::from_state(target));
        let sent = command(
            self.inner.remote.as_ref(),
            &path,
            Write::Post(None),
            self.inner.timeout,
        )
        .await;

        if let Err(err) = sent {
            warn!(button_id, "toggle failed, rolling back: {err}");
            self.inner.ledger.lock().rollback(button_id);
            self.cancel_timer(button_id);
            self.inner.notifier.notify();
            return Err(err);
        }

        if let Some(mapping) = self.inner.status.button_mapping(button_id) {
            self.schedule_refreshes(&mapping.device_id);
        }
        Ok(ToggleOutcome::Accepted)
    }

    pub fn button_view(&self, button_id: &str) -> ButtonView {
        let polled = self.inner.status.button_state(button_id);
        let is_online = self.inner.status.button_online(button_id);
        let now_ms = self.inner.clock.now_ms();
        let ledger = self.inner.ledger.lock();
        let pending = ledger.pending(button_id);
        ButtonView {
            state: ledger.applied(button_id).unwrap_or(polled.state),
            is_stale: polled.is_stale,
            is_online,
            pending_target: pending.map(|command| command.target_state),
            settles_in_ms: ledger
                .deadline_ms(button_id)
                .map(|deadline| deadline.saturating_sub(now_ms)),
            loading: pending.is_some(),
        }
    }

    pub fn all_button_views(&self) -> BTreeMap<String, ButtonView> {
        self.inner
            .status
            .all_button_states()
            .into_keys()
            .map(|button_id| {
                let view = self.button_view(&button_id);
                (button_id, view)
            })
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.ledger.lock().pending_count()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(callback)
    }
}
