use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::info;

use rvdash_common::{
    endpoints::{
        heater_command, PATH_HEATER_CONNECTION_STATUS, PATH_HEATER_CONTROL_STATE,
        PATH_HEATER_HEALTH, PATH_HEATER_STATUS, PATH_HEATER_TEMPERATURE,
    },
    heater::{
        ApiResponse, ConnectionStatus, ControlState, FaultInfo, HealthData, HeaterOperation,
        HeaterStatus, RunningInfo, TemperatureInfo,
    },
};

use crate::{
    error::RemoteError,
    remote::{fetch, send, RemoteSource, Write},
    snapshot_cache::{DomainSource, SnapshotCache},
};

fn unwrap_envelope<T>(path: &str, response: ApiResponse<T>) -> Result<T, RemoteError> {
    match (response.success, response.data) {
        (true, Some(data)) => Ok(data),
        (true, None) => Err(RemoteError::Decode {
            path: path.to_string(),
            message: "successful response without data".to_string(),
        }),
        (false, _) => Err(RemoteError::Rejected {
            path: path.to_string(),
            message: response.message,
        }),
    }
}

async fn query<T: DeserializeOwned>(
    remote: &dyn RemoteSource,
    path: &str,
    timeout: Duration,
) -> Result<T, RemoteError> {
    let response: ApiResponse<T> = fetch(remote, path, timeout).await?;
    unwrap_envelope(path, response)
}

pub struct HeaterSource;

#[async_trait]
impl DomainSource for HeaterSource {
    type Value = HeaterStatus;

    fn name(&self) -> &'static str {
        "diesel-heater"
    }

    async fn fetch(
        &self,
        remote: &dyn RemoteSource,
        timeout: Duration,
    ) -> Result<HeaterStatus, RemoteError> {
        query(remote, PATH_HEATER_STATUS, timeout).await
    }
}

pub type HeaterCache = SnapshotCache<HeaterSource>;

impl SnapshotCache<HeaterSource> {
    async fn run_command(&self, path: &str, write: Write) -> Result<(), RemoteError> {
        let response: ApiResponse<Value> = send(self.remote(), path, write, self.timeout()).await?;
        if !response.success {
            return Err(RemoteError::Rejected {
                path: path.to_string(),
                message: response.message,
            });
        }
        self.force_refresh().await;
        Ok(())
    }

    pub async fn operate(&self, operation: HeaterOperation) -> Result<(), RemoteError> {
        let path = heater_command(operation.path_segment());
        self.run_command(&path, Write::Post(None)).await?;
        info!(operation = operation.path_segment(), "heater command accepted");
        Ok(())
    }

    pub async fn start_with_heating(&self) -> Result<(), RemoteError> {
        self.operate(HeaterOperation::StartWithHeating).await
    }

    pub async fn start_without_heating(&self) -> Result<(), RemoteError> {
        self.operate(HeaterOperation::StartWithoutHeating).await
    }

    pub async fn stop_heater(&self) -> Result<(), RemoteError> {
        self.operate(HeaterOperation::Stop).await
    }

    pub async fn toggle_heating(&self) -> Result<(), RemoteError> {
        self.operate(HeaterOperation::ToggleHeating).await
    }

    pub async fn connect(&self) -> Result<(), RemoteError> {
        self.operate(HeaterOperation::Connect).await
    }

    pub async fn disconnect(&self) -> Result<(), RemoteError> {
        self.operate(HeaterOperation::Disconnect).await
    }

    pub async fn set_target_temperature(&self, temperature: f64) -> Result<(), RemoteError> {
        self.run_command(
            PATH_HEATER_TEMPERATURE,
            Write::Put(json!({ "temperature": temperature })),
        )
        .await?;
        info!(temperature, "heater target temperature set");
        Ok(())
    }

    pub async fn connection_status(&self) -> Result<ConnectionStatus, RemoteError> {
        query(self.remote(), PATH_HEATER_CONNECTION_STATUS, self.timeout()).await
    }

    pub async fn control_state(&self) -> Result<ControlState, RemoteError> {
        query(self.remote(), PATH_HEATER_CONTROL_STATE, self.timeout()).await
    }

    pub async fn health(&self) -> Result<HealthData, RemoteError> {
        query(self.remote(), PATH_HEATER_HEALTH, self.timeout()).await
    }

    pub fn temperature_info(&self) -> Option<TemperatureInfo> {
        self.value().map(|status| status.temperature_info())
    }

    pub fn running_info(&self) -> Option<RunningInfo> {
        self.value().map(|status| status.running_info())
    }

    pub fn fault_info(&self) -> Option<FaultInfo> {
        self.value().map(|status| status.fault_info())
    }

    pub fn is_online(&self) -> bool {
        self.value().is_some_and(|status| status.online)
    }

    pub fn is_connected(&self) -> bool {
        self.value().is_some_and(|status| status.connection_status)
    }

    pub fn last_update(&self) -> Option<DateTime<FixedOffset>> {
        self.value().and_then(|status| status.last_update())
    }
}
