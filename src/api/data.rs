//! Generic table data, addressed by logical table name.

use crate::api::{reply, AppState};
use crate::error::Result;
use crate::schema::Record;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

pub async fn list_data(
    State(state): State<Arc<AppState>>,
    Path((id, table)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.get_all_data(&id, &table).await?))
}

pub async fn save_data(
    State(state): State<Arc<AppState>>,
    Path((id, table)): Path<(String, String)>,
    Json(body): Json<Record>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.create_or_update_data(&id, &table, body).await?))
}

pub async fn delete_all_data(
    State(state): State<Arc<AppState>>,
    Path((id, table)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.delete_all_data(&id, &table).await?))
}

pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Path((id, table, record_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.get_one_data(&id, &table, &record_id).await?))
}

pub async fn delete_data(
    State(state): State<Arc<AppState>>,
    Path((id, table, record_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.delete_one_data(&id, &table, &record_id).await?))
}
