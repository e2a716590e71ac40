//! Tenant-Scoped Data Operations
//!
//! Every operation resolves its model handle through the Model Registry on
//! each call; handles are never cached here.

mod accounts;
mod data;
mod import;
mod tasks;

pub use import::{infer_value, parse_csv, AccountImporter};
pub use tasks::merge_task_messages;

use crate::engine::ModelHandle;
use crate::error::{GatewayError, Result};
use crate::registry::ModelRegistry;
use crate::schema::Record;
use serde::Serialize;
use std::sync::Arc;

pub struct TenantOps {
    models: Arc<ModelRegistry>,
    importer: Arc<AccountImporter>,
}

/// Result of a bulk import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
}

/// Result of a delete
#[derive(Debug, Clone, Serialize)]
pub struct DeleteSummary {
    pub count: u64,
}

impl TenantOps {
    pub fn new(models: Arc<ModelRegistry>, importer: Arc<AccountImporter>) -> Self {
        Self { models, importer }
    }

    fn model(&self, storage_id: &str, table: &str) -> Result<Arc<dyn ModelHandle>> {
        self.models.resolve(storage_id, table)
    }
}

async fn find_existing(handle: &dyn ModelHandle, id: &str) -> Result<Record> {
    handle
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found(handle, id))
}

fn not_found(handle: &dyn ModelHandle, id: &str) -> GatewayError {
    GatewayError::RecordNotFound {
        table: handle.table_name().to_string(),
        id: id.to_string(),
    }
}

/// First record written by an update; nothing written means nothing matched.
fn first_updated(handle: &dyn ModelHandle, id: &str, updated: Vec<Record>) -> Result<Record> {
    updated.into_iter().next().ok_or_else(|| not_found(handle, id))
}
