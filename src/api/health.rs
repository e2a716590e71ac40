use crate::api::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    engines: Vec<String>,
    storages: usize,
    models: usize,
    live_connections: usize,
    errored_connections: usize,
    dial_attempts: u64,
    uptime_seconds: u64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let gateway = &state.gateway;
    let errored_connections = gateway.connections.errored_connections();

    Json(HealthResponse {
        status: if errored_connections == 0 {
            "healthy".to_string()
        } else {
            "degraded".to_string()
        },
        engines: gateway
            .connections
            .engines()
            .types()
            .iter()
            .map(|t| t.to_string())
            .collect(),
        storages: gateway.storages.len(),
        models: gateway.models.len(),
        live_connections: gateway.connections.live_connections(),
        errored_connections,
        dial_attempts: gateway.connections.dial_attempts(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
