use crate::api::{reply, AppState};
use crate::error::{GatewayError, Result};
use crate::schema::Record;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub url: String,
}

pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.get_all_accounts(&id).await?))
}

pub async fn save_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Record>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.create_or_update_account(&id, body).await?))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path((id, account_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.get_one_account(&id, &account_id).await?))
}

pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path((id, account_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.delete_one_account(&id, &account_id).await?))
}

pub async fn import_accounts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<ImportRequest>,
) -> Result<impl IntoResponse> {
    if request.url.trim().is_empty() {
        return Err(GatewayError::InvalidRequest {
            message: "url must not be empty".to_string(),
        });
    }

    Ok(reply(state.gateway.ops.import_accounts(&id, &request.url).await?))
}
