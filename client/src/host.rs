use std::{
    collections::HashMap,
    io::ErrorKind,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use rvdash_common::{heater::HeaterOperation, pms::InverterAction, ClientConfig};

use crate::{
    dashboard::Dashboard,
    error::{RemoteError, ToggleOutcome},
};

type AppState = Arc<Dashboard>;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct ToggleBody {
    outcome: ToggleOutcome,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config_path = std::env::var("RVDASH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./rvdash.json"));
    let mut config = load_client_config(&config_path).await.unwrap_or_else(|err| {
        warn!("failed to load client config: {err:#}");
        ClientConfig::default()
    });
    apply_env_overrides(
        &mut config,
        std::env::var("RVDASH_API_BASE").ok(),
        std::env::var("RVDASH_HTTP_PORT").ok(),
    );
    config.sanitize();
    info!(api_base = %config.api_base, "client config loaded");

    let dashboard =
        Arc::new(Dashboard::connect(&config).context("failed to build backend client")?);
    log_changes(&dashboard);
    dashboard.start();

    let app = Router::new()
        .route("/api/rooms", get(handle_get_rooms))
        .route("/api/buttons", get(handle_get_buttons))
        .route("/api/buttons/{id}/toggle", post(handle_toggle_button))
        .route("/api/devices", get(handle_get_devices))
        .route("/api/pms", get(handle_get_pms))
        .route("/api/inverter/{target}/{action}", post(handle_inverter))
        .route("/api/heater", get(handle_get_heater))
        .route("/api/heater/temperature", put(handle_heater_temperature))
        .route("/api/heater/{op}", post(handle_heater_operation))
        .route("/api/tanks", get(handle_get_tanks))
        .route("/api/weather", get(handle_get_weather))
        .with_state(Arc::clone(&dashboard));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard server at {addr}"))?;

    info!("dashboard listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
            }
        })
        .await?;

    dashboard.stop();
    info!("dashboard stopped");
    Ok(())
}

async fn load_client_config(path: &Path) -> anyhow::Result<ClientConfig> {
    match tokio::fs::read(path).await {
        Ok(raw) => serde_json::from_slice::<ClientConfig>(&raw)
            .with_context(|| format!("malformed client config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

fn apply_env_overrides(
    config: &mut ClientConfig,
    api_base: Option<String>,
    http_port: Option<String>,
) {
    if let Some(api_base) = api_base.filter(|value| !value.trim().is_empty()) {
        config.api_base = api_base;
    }
    if let Some(port) = http_port.and_then(|value| value.parse::<u16>().ok()) {
        config.http_port = port;
    }
}

fn log_changes(dashboard: &Dashboard) {
    let _ = dashboard.devices.subscribe(|| debug!("device status changed"));
    let _ = dashboard.buttons.subscribe(|| debug!("button views changed"));
    let _ = dashboard.pms.subscribe(|| debug!("pms snapshot changed"));
    let _ = dashboard.heater.subscribe(|| debug!("heater snapshot changed"));
    for sensor in dashboard.tanks.sensors() {
        let name = sensor.name();
        let _ = sensor.subscribe(move || debug!(sensor = name, "tank level changed"));
    }
    if let Some(weather) = &dashboard.weather {
        let _ = weather.subscribe(|| debug!("weather changed"));
    }
}

async fn handle_get_rooms(State(state): State<AppState>) -> impl IntoResponse {
    match state.config.rooms().await {
        Ok(rooms) => Json(rooms).into_response(),
        Err(err) => remote_error_response(&err),
    }
}

async fn handle_get_buttons(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.buttons.all_button_views())
}

async fn handle_get_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.devices.all_device_states())
}

async fn handle_toggle_button(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let target = match value.to_ascii_lowercase().as_str() {
        "on" => true,
        "off" => false,
        _ => return error_response(StatusCode::BAD_REQUEST, "Invalid value. Use 'on' or 'off'"),
    };

    match state.buttons.toggle(&id, target).await {
        Ok(ToggleOutcome::Accepted) => (
            StatusCode::ACCEPTED,
            Json(ToggleBody {
                outcome: ToggleOutcome::Accepted,
            }),
        )
            .into_response(),
        Ok(outcome) => (StatusCode::CONFLICT, Json(ToggleBody { outcome })).into_response(),
        Err(err) => remote_error_response(&err),
    }
}

async fn handle_get_pms(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pms.view_or_refresh())
}

async fn handle_inverter(
    State(state): State<AppState>,
    UrlPath((target, action)): UrlPath<(String, String)>,
) -> impl IntoResponse {
    let Some(action) = InverterAction::parse(&action) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid action. Use 'OPEN' or 'CLOSE'");
    };
    match state.pms.set_inverter(&target, action).await {
        Ok(()) => Json(state.pms.view()).into_response(),
        Err(err) => remote_error_response(&err),
    }
}

async fn handle_get_heater(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.heater.view_or_refresh())
}

async fn handle_heater_operation(
    State(state): State<AppState>,
    UrlPath(op): UrlPath<String>,
) -> impl IntoResponse {
    let Some(operation) = HeaterOperation::parse(&op) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown heater operation");
    };
    match state.heater.operate(operation).await {
        Ok(()) => Json(state.heater.view()).into_response(),
        Err(err) => remote_error_response(&err),
    }
}

async fn handle_heater_temperature(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("value") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'value' parameter");
    };
    let Ok(temperature) = value.parse::<f64>() else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid temperature value");
    };
    match state.heater.set_target_temperature(temperature).await {
        Ok(()) => Json(state.heater.view()).into_response(),
        Err(err) => remote_error_response(&err),
    }
}

async fn handle_get_tanks(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.tanks.tanks())
}

async fn handle_get_weather(State(state): State<AppState>) -> impl IntoResponse {
    match &state.weather {
        Some(weather) => Json(weather.view_or_refresh()).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Weather is not configured"),
    }
}

fn remote_error_response(err: &RemoteError) -> axum::response::Response {
    let status = match err {
        RemoteError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        RemoteError::Rejected { .. } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_response(status, &err.to_string())
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scratch_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rvdash-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn missing_config_file_yields_defaults() {
        let path = std::env::temp_dir().join("rvdash-definitely-missing.json");
        let config = load_client_config(&path).await.unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[tokio::test]
    async fn malformed_config_file_is_an_error() {
        let path = scratch_file("malformed.json", "{ not json");
        let result = load_client_config(&path).await;
        std::fs::remove_file(&path).unwrap();

        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("malformed client config"));
    }

    #[tokio::test]
    async fn partial_config_file_keeps_section_defaults() {
        let path = scratch_file(
            "partial.json",
            r#"{"api_base": "https://10.0.0.9/v1", "request_timeout_ms": 2000,
                "accept_invalid_certs": false, "http_port": 9000}"#,
        );
        let config = load_client_config(&path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.api_base, "https://10.0.0.9/v1");
        assert_eq!(config.devices, ClientConfig::default().devices);
        assert!(config.weather.is_none());
    }

    #[test]
    fn env_overrides_apply_last() {
        let mut config = ClientConfig::default();
        apply_env_overrides(
            &mut config,
            Some("https://backend.local/v1".to_string()),
            Some("9090".to_string()),
        );
        assert_eq!(config.api_base, "https://backend.local/v1");
        assert_eq!(config.http_port, 9090);

        apply_env_overrides(&mut config, Some("  ".to_string()), Some("not-a-port".to_string()));
        assert_eq!(config.api_base, "https://backend.local/v1");
        assert_eq!(config.http_port, 9090);
    }

    #[test]
    fn remote_errors_map_to_gateway_statuses() {
        let timeout = RemoteError::Timeout {
            path: "/x".to_string(),
            timeout_ms: 5_000,
        };
        assert_eq!(remote_error_response(&timeout).status(), StatusCode::GATEWAY_TIMEOUT);
        let down = RemoteError::Transport("refused".to_string());
        assert_eq!(remote_error_response(&down).status(), StatusCode::BAD_GATEWAY);
    }
}
