use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, error};

type Callback = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    name: &'static str,
    debounce: Duration,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(u64, Callback)>>,
    scheduled: AtomicBool,
    holds: AtomicUsize,
    deferred: AtomicBool,
}

impl Inner {
    fn deliver(&self) {
        let callbacks: Vec<Callback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        debug!(
            notifier = self.name,
            subscribers = callbacks.len(),
            "delivering change notification"
        );
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
                error!(notifier = self.name, "subscriber callback panicked");
            }
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

impl Notifier {
    pub fn new(name: &'static str, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                debounce,
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                scheduled: AtomicBool::new(false),
                holds: AtomicUsize::new(0),
                deferred: AtomicBool::new(false),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        Subscription {
            notifier: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    // Requires a tokio runtime.
    pub fn notify(&self) {
        if self.inner.holds.load(Ordering::Acquire) > 0 {
            self.inner.deferred.store(true, Ordering::Release);
            return;
        }
        if self.inner.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.scheduled.store(false, Ordering::Release);
            inner.deliver();
        });
    }

    pub fn hold(&self) -> HoldGuard {
        self.inner.holds.fetch_add(1, Ordering::AcqRel);
        HoldGuard {
            notifier: self.clone(),
        }
    }
}

pub struct HoldGuard {
    notifier: Notifier,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        let inner = &self.notifier.inner;
        if inner.holds.fetch_sub(1, Ordering::AcqRel) == 1
            && inner.deferred.swap(false, Ordering::AcqRel)
        {
            self.notifier.notify();
        }
    }
}

// Dropping this keeps the callback registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    notifier: Weak<Inner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(inner) = self.notifier.upgrade() {
            inner.subscribers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}
