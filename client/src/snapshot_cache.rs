use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use rvdash_common::{DomainSnapshot, SnapshotCacheConfig, SnapshotView};

use crate::{
    clock::Clock,
    error::RemoteError,
    fanout::{Notifier, Subscription},
    remote::{RemoteSource, SharedRemote},
};

#[async_trait]
pub trait DomainSource: Send + Sync + 'static {
    type Value: Clone + PartialEq + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        remote: &dyn RemoteSource,
        timeout: Duration,
    ) -> Result<Self::Value, RemoteError>;
}

struct Inner<S: DomainSource> {
    source: S,
    remote: SharedRemote,
    settings: SnapshotCacheConfig,
    timeout: Duration,
    clock: Clock,
    snapshot: Mutex<DomainSnapshot<S::Value>>,
    notifier: Notifier,
    ready: AtomicBool,
    poller: Mutex<Option<JoinHandle<()>>>,
}

struct InFlight<'a, T> {
    snapshot: &'a Mutex<DomainSnapshot<T>>,
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        self.snapshot.lock().end_refresh();
    }
}

// A failed poll leaves the value unstamped so it ages into staleness.
pub struct SnapshotCache<S: DomainSource> {
    inner: Arc<Inner<S>>,
}

impl<S: DomainSource> Clone for SnapshotCache<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: DomainSource> SnapshotCache<S> {
    pub fn new(
        source: S,
        remote: SharedRemote,
        settings: SnapshotCacheConfig,
        timeout: Duration,
        clock: Clock,
    ) -> Self {
        let notifier = Notifier::new(
            source.name(),
            Duration::from_millis(settings.notify_debounce_ms),
        );
        Self {
            inner: Arc::new(Inner {
                source,
                remote,
                settings,
                timeout,
                clock,
                snapshot: Mutex::new(DomainSnapshot::new()),
                notifier,
                ready: AtomicBool::new(false),
                poller: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.source.name()
    }

    pub fn start(&self) {
        let cache = self.clone();
        let period = Duration::from_millis(self.inner.settings.poll_interval_ms);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                cache.refresh().await;
            }
        });
        if let Some(previous) = self.inner.poller.lock().replace(handle) {
            previous.abort();
        }
        info!(domain = self.name(), "snapshot polling started");
    }

    pub fn stop(&self) {
        if let Some(handle) = self.inner.poller.lock().take() {
            handle.abort();
            info!(domain = self.name(), "snapshot polling stopped");
        }
    }

    pub async fn refresh(&self) {
        if !self.inner.snapshot.lock().begin_refresh() {
            debug!(domain = self.name(), "refresh already in flight");
            return;
        }
        let _in_flight = InFlight {
            snapshot: &self.inner.snapshot,
        };
        self.fetch_and_record().await;
    }

    pub async fn force_refresh(&self) {
        self.fetch_and_record().await;
    }

    async fn fetch_and_record(&self) {
        let fetched = self
            .inner
            .source
            .fetch(self.inner.remote.as_ref(), self.inner.timeout)
            .await;
        match fetched {
            Ok(value) => {
                let now_ms = self.inner.clock.now_ms();
                let changed = self.inner.snapshot.lock().record(value, now_ms);
                if !self.inner.ready.swap(true, Ordering::AcqRel) {
                    info!(domain = self.name(), "snapshot ready");
                }
                if changed {
                    debug!(domain = self.name(), "snapshot changed");
                    self.inner.notifier.notify();
                }
            }
            Err(err) => warn!(domain = self.name(), "snapshot refresh failed: {err}"),
        }
    }

    pub fn view(&self) -> SnapshotView<S::Value> {
        self.inner
            .snapshot
            .lock()
            .view(self.inner.clock.now_ms(), self.inner.settings.ttl_ms)
    }

    pub fn view_or_refresh(&self) -> SnapshotView<S::Value> {
        let view = self.view();
        if view.is_stale {
            let cache = self.clone();
            tokio::spawn(async move { cache.refresh().await });
        }
        view
    }

    pub fn value(&self) -> Option<S::Value> {
        self.inner.snapshot.lock().value().cloned()
    }

    pub fn is_stale(&self) -> bool {
        self.inner
            .snapshot
            .lock()
            .is_stale(self.inner.clock.now_ms(), self.inner.settings.ttl_ms)
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    pub fn is_updating(&self) -> bool {
        self.inner.snapshot.lock().is_updating()
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(callback)
    }

    pub(crate) fn source(&self) -> &S {
        &self.inner.source
    }

    pub(crate) fn remote(&self) -> &dyn RemoteSource {
        self.inner.remote.as_ref()
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.inner.timeout
    }
}
