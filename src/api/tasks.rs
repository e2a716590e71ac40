use crate::api::{reply, AppState};
use crate::error::Result;
use crate::schema::Record;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Path((id, account_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.get_all_tasks(&id, &account_id).await?))
}

pub async fn save_task(
    State(state): State<Arc<AppState>>,
    Path((id, account_id)): Path<(String, String)>,
    Json(body): Json<Record>,
) -> Result<impl IntoResponse> {
    Ok(reply(
        state
            .gateway
            .ops
            .create_or_update_task(&id, &account_id, body)
            .await?,
    ))
}

pub async fn delete_tasks(
    State(state): State<Arc<AppState>>,
    Path((id, account_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    Ok(reply(state.gateway.ops.delete_all_tasks(&id, &account_id).await?))
}
