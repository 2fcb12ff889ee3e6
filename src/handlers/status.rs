use axum::{extract::State, Json};

use super::AppState;
use crate::client::DaemonStatus;

/// `GET /status`, used by clients as a liveness probe
pub async fn status(State(state): State<AppState>) -> Json<DaemonStatus> {
    let config = &state.config;
    Json(DaemonStatus {
        status: "healthy".to_string(),
        service_name: config.server.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        host: config.server.host.clone(),
        port: config.server.port,
        retention_days: config.retention.days.days(),
    })
}
