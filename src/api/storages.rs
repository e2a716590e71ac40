use crate::api::{reply, AppState};
use crate::config::ProvisionMode;
use crate::engine::EngineType;
use crate::error::{GatewayError, Result};
use crate::provision::ProvisionReport;
use crate::registry::{NewStorage, StorageDescriptor};
use crate::schema::TableSchema;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A storage descriptor as returned to clients; the password stays server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageView {
    pub id: String,
    pub engine_type: EngineType,
    pub db_name: String,
    pub db_ip: String,
    pub db_port: u16,
    pub db_user_name: String,
    pub db_prefix_table: String,
    pub db_structure: Vec<TableSchema>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<Vec<String>>,
}

impl From<&StorageDescriptor> for StorageView {
    fn from(storage: &StorageDescriptor) -> Self {
        Self {
            id: storage.id.clone(),
            engine_type: storage.engine_type,
            db_name: storage.db_name.clone(),
            db_ip: storage.db_ip.clone(),
            db_port: storage.db_port,
            db_user_name: storage.db_user_name.clone(),
            db_prefix_table: storage.db_prefix_table.clone(),
            db_structure: storage.db_structure.clone(),
            created_at: storage.created_at,
            tables: None,
        }
    }
}

#[derive(Serialize)]
pub struct CreateStorageResponse {
    pub storage: StorageView,
    pub report: Option<ProvisionReport>,
}

pub async fn create_storage(
    State(state): State<Arc<AppState>>,
    Json(request): Json<NewStorage>,
) -> Result<Response> {
    let gateway = &state.gateway;

    match state.provision_mode {
        ProvisionMode::Wait => {
            let (storage, report) = gateway.create_storage(request).await?;
            // The descriptor is stored either way, so a failed run still names it
            let report = match report {
                Ok(report) => report,
                Err(e) => return Ok(e.into_storage_response(&storage.id)),
            };

            Ok((
                StatusCode::CREATED,
                reply(CreateStorageResponse {
                    storage: StorageView::from(storage.as_ref()),
                    report: Some(report),
                }),
            )
                .into_response())
        }
        ProvisionMode::Background => {
            let (storage, handle) = gateway.create_storage_in_background(request)?;

            tokio::spawn(async move {
                let storage_id = handle.storage_id().to_string();
                match handle.wait().await {
                    Ok(report) if report.is_complete() => {
                        info!("Background provisioning of {} finished", storage_id)
                    }
                    Ok(report) => warn!(
                        "Background provisioning of {} finished with {} failed tables",
                        storage_id,
                        report.failed().count()
                    ),
                    Err(e) => warn!("Background provisioning of {} failed: {}", storage_id, e),
                }
            });

            Ok((
                StatusCode::ACCEPTED,
                reply(CreateStorageResponse {
                    storage: StorageView::from(storage.as_ref()),
                    report: None,
                }),
            )
                .into_response())
        }
    }
}

pub async fn list_storages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let storages: Vec<StorageView> = state
        .gateway
        .storages
        .list()
        .iter()
        .map(|s| StorageView::from(s.as_ref()))
        .collect();
    reply(storages)
}

pub async fn get_storage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let gateway = &state.gateway;
    let storage = gateway
        .storages
        .get(&id)
        .ok_or_else(|| GatewayError::StorageNotFound { storage_id: id.clone() })?;

    let mut view = StorageView::from(storage.as_ref());
    view.tables = Some(gateway.models.tables(&storage.tenant_key()));
    Ok(reply(view))
}
