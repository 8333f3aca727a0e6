pub mod config;
pub mod endpoints;
pub mod heater;
pub mod ledger;
pub mod pms;
pub mod sensor;
pub mod snapshot;
pub mod status;
pub mod types;
pub mod weather;

pub use config::{
    ClientConfig, LevelSensorConfig, ReconcileConfig, SnapshotCacheConfig, StatusCacheConfig,
    WeatherConfig,
};
pub use ledger::{CommandLedger, ObserveOutcome, PendingCommand, Rejection};
pub use snapshot::{is_stale, DomainSnapshot, SnapshotView};
pub use status::{ButtonState, ButtonStatus, DeviceStatusTable, DeviceStatusView};
pub use types::{
    ButtonConfig, CommandResponse, DeviceConfig, RelayStates, RoomButton, RoomInfo, RoomsResponse,
    SwitchAction,
};
