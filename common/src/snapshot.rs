use serde::Serialize;

pub fn is_stale(last_update_ms: Option<u64>, now_ms: u64, ttl_ms: u64) -> bool {
    last_update_ms
        .map(|last| now_ms.saturating_sub(last) > ttl_ms)
        .unwrap_or(true)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotView<T> {
    pub data: Option<T>,
    #[serde(rename = "isStale")]
    pub is_stale: bool,
    #[serde(rename = "lastUpdateMs")]
    pub last_update_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct DomainSnapshot<T> {
    value: Option<T>,
    last_update_ms: Option<u64>,
    is_updating: bool,
}

impl<T> Default for DomainSnapshot<T> {
    fn default() -> Self {
        Self {
            value: None,
            last_update_ms: None,
            is_updating: false,
        }
    }
}

impl<T> DomainSnapshot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_refresh(&mut self) -> bool {
        if self.is_updating {
            return false;
        }
        self.is_updating = true;
        true
    }

    pub fn end_refresh(&mut self) {
        self.is_updating = false;
    }

    pub fn is_updating(&self) -> bool {
        self.is_updating
    }
}

impl<T: Clone + PartialEq> DomainSnapshot<T> {
    pub fn record(&mut self, value: T, now_ms: u64) -> bool {
        let changed = self.value.as_ref() != Some(&value);
        self.value = Some(value);
        self.last_update_ms = Some(now_ms);
        changed
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn last_update_ms(&self) -> Option<u64> {
        self.last_update_ms
    }

    pub fn is_stale(&self, now_ms: u64, ttl_ms: u64) -> bool {
        is_stale(self.last_update_ms, now_ms, ttl_ms)
    }

    pub fn view(&self, now_ms: u64, ttl_ms: u64) -> SnapshotView<T> {
        SnapshotView {
            data: self.value.clone(),
            is_stale: self.is_stale(now_ms, ttl_ms),
            last_update_ms: self.last_update_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_updated_is_stale() {
        assert!(is_stale(None, 0, 10_000));
        assert!(DomainSnapshot::<u8>::new().is_stale(0, 10_000));
    }

    #[test]
    fn staleness_starts_after_ttl_boundary() {
        assert!(!is_stale(Some(1_000), 11_000, 10_000));
        assert!(is_stale(Some(1_000), 11_001, 10_000));
    }

    #[test]
    fn identical_payload_is_not_a_change() {
        let mut snapshot = DomainSnapshot::new();
        assert!(snapshot.record(vec![1, 2], 100));
        assert!(!snapshot.record(vec![1, 2], 200));
        assert!(snapshot.record(vec![2, 2], 300));
        assert_eq!(snapshot.last_update_ms(), Some(300));
    }

    #[test]
    fn refresh_guard_rejects_reentry() {
        let mut snapshot = DomainSnapshot::<u8>::new();
        assert!(snapshot.begin_refresh());
        assert!(!snapshot.begin_refresh());
        snapshot.end_refresh();
        assert!(snapshot.begin_refresh());
    }

    #[test]
    fn failed_poll_ages_out_the_previous_value() {
        let mut snapshot = DomainSnapshot::new();
        snapshot.record(42_u32, 1_000);

        let view = snapshot.view(4_500, 3_000);

        assert_eq!(view.data, Some(42));
        assert!(view.is_stale);
    }
}
