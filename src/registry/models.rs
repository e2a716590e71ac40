//! Model Registry
//!
//! Maps `(TenantKey, physical table name)` to a live model handle and resolves
//! the logical names used by API callers. Entries are persisted to
//! `model-config.json` before they become resolvable, which lets a restart
//! re-attach them without touching the database schema.

use crate::connection::{ConnectionRegistry, TenantKey};
use crate::engine::ModelHandle;
use crate::error::{GatewayError, Result};
use crate::registry::metadata::{MetadataStore, ModelRecord};
use crate::registry::storage::StorageStore;
use crate::schema::TableSchema;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ModelEntry {
    pub storage_id: String,
    pub logical_name: String,
    pub tenant_key: TenantKey,
    pub physical_name: String,
    pub handle: Arc<dyn ModelHandle>,
}

/// Outcome of re-loading persisted metadata at startup
#[derive(Debug, Default, Clone, Serialize)]
pub struct RestoreReport {
    pub datasources: usize,
    pub failed_datasources: Vec<String>,
    pub models: usize,
    pub skipped_models: Vec<String>,
    /// Storages provisioned again because tables were missing
    pub reprovisioned: Vec<String>,
    pub failed_storages: Vec<String>,
}

pub struct ModelRegistry {
    storages: Arc<StorageStore>,
    connections: Arc<ConnectionRegistry>,
    metadata: Arc<MetadataStore>,
    models: DashMap<(TenantKey, String), Arc<ModelEntry>>,
}

impl ModelRegistry {
    pub fn new(
        storages: Arc<StorageStore>,
        connections: Arc<ConnectionRegistry>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            storages,
            connections,
            metadata,
            models: DashMap::new(),
        }
    }

    /// Record a freshly materialized table. The entry is written to disk
    /// first; a failed write leaves it unresolvable.
    pub fn register(
        &self,
        storage_id: &str,
        logical: &str,
        tenant: &TenantKey,
        schema: &TableSchema,
        handle: Arc<dyn ModelHandle>,
    ) -> Result<()> {
        let record = ModelRecord::new(storage_id, logical, tenant, schema);

        if let Some(existing) = self.metadata.model(&record.key())? {
            if existing.checksum != record.checksum {
                warn!(
                    "Table {} in {} was registered with a different definition; the existing table is kept as is",
                    schema.name, tenant
                );
            }
        }

        self.metadata.save_model(&record)?;
        self.insert(record, handle);

        debug!("Registered model {} ({}) for {}", schema.name, logical, tenant);
        Ok(())
    }

    fn insert(&self, record: ModelRecord, handle: Arc<dyn ModelHandle>) {
        let entry = ModelEntry {
            storage_id: record.storage_id,
            logical_name: record.logical_name,
            tenant_key: record.data_source.clone(),
            physical_name: record.name.clone(),
            handle,
        };
        self.models
            .insert((record.data_source, record.name), Arc::new(entry));
    }

    pub fn resolve(&self, storage_id: &str, logical: &str) -> Result<Arc<dyn ModelHandle>> {
        Ok(self.resolve_entry(storage_id, logical)?.handle.clone())
    }

    pub fn resolve_entry(&self, storage_id: &str, logical: &str) -> Result<Arc<ModelEntry>> {
        let storage = self
            .storages
            .get(storage_id)
            .ok_or_else(|| GatewayError::StorageNotFound {
                storage_id: storage_id.to_string(),
            })?;

        let tenant = storage.tenant_key();
        match self.connections.get(&tenant) {
            Some(connection) if connection.is_live() => {}
            _ => {
                return Err(GatewayError::DatasourceNotFound {
                    tenant: tenant.to_string(),
                })
            }
        }

        let physical = storage.physical_name(logical);
        self.models
            .get(&(tenant, physical))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GatewayError::ModelNotFound {
                storage_id: storage_id.to_string(),
                table: logical.to_string(),
            })
    }

    /// Physical names registered for a tenant, sorted
    pub fn tables(&self, tenant: &TenantKey) -> Vec<String> {
        let mut tables: Vec<String> = self
            .models
            .iter()
            .filter(|entry| &entry.key().0 == tenant)
            .map(|entry| entry.key().1.clone())
            .collect();
        tables.sort();
        tables
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Re-dial every persisted datasource and re-attach every persisted model.
    /// Failures are logged and reported; the affected tenants resolve to
    /// `DatasourceNotFound` until they are provisioned again.
    pub async fn restore(&self) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();

        for (key, params) in self.metadata.datasources()? {
            let tenant = params.tenant_key();
            match self.connections.get_or_create(&tenant, &params).await {
                Ok(_) => report.datasources += 1,
                Err(e) => {
                    warn!("Failed to restore datasource {}: {}", key, e);
                    report.failed_datasources.push(key);
                }
            }
        }

        for (key, record) in self.metadata.models()? {
            let datasource = match self.connections.get(&record.data_source) {
                Some(connection) => match connection.datasource() {
                    Ok(datasource) => datasource.clone(),
                    Err(e) => {
                        debug!("Skipping model {}: {}", key, e);
                        report.skipped_models.push(key);
                        continue;
                    }
                },
                None => {
                    warn!("Model {} references unknown datasource {}", key, record.data_source);
                    report.skipped_models.push(key);
                    continue;
                }
            };

            match datasource.attach(&record.schema()) {
                Ok(handle) => {
                    self.insert(record, handle);
                    report.models += 1;
                }
                Err(e) => {
                    warn!("Failed to attach model {}: {}", key, e);
                    report.skipped_models.push(key);
                }
            }
        }

        info!(
            "Restored {} datasources ({} failed) and {} models ({} skipped)",
            report.datasources,
            report.failed_datasources.len(),
            report.models,
            report.skipped_models.len()
        );

        Ok(report)
    }
}
