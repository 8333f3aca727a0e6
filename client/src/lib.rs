pub mod clock;
pub mod config_cache;
pub mod dashboard;
pub mod error;
pub mod fanout;
pub mod heater;
pub mod host;
pub mod pms;
pub mod reconciler;
pub mod remote;
pub mod sensors;
pub mod snapshot_cache;
pub mod status_cache;
pub mod weather;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::Clock;
pub use config_cache::{ConfigCache, Topology};
pub use dashboard::Dashboard;
pub use error::{RemoteError, ToggleOutcome};
pub use fanout::{Notifier, Subscription};
pub use reconciler::{ButtonReconciler, ButtonView};
pub use remote::{HttpRemote, RemoteSource, SharedRemote};
pub use snapshot_cache::{DomainSource, SnapshotCache};
pub use status_cache::{DeviceObservation, DeviceStatusCache};
