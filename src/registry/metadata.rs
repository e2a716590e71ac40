//! Durable metadata: the three JSON documents kept in the data directory.

use crate::connection::{ConnectionParams, TenantKey};
use crate::error::Result;
use crate::registry::document::JsonDocument;
use crate::registry::storage::StorageDescriptor;
use crate::schema::{FieldDef, TableSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DATASOURCES_FILE: &str = "datasources.json";
pub const MODEL_CONFIG_FILE: &str = "model-config.json";
pub const STORAGES_FILE: &str = "storages.json";

/// One materialized table as recorded in `model-config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub data_source: TenantKey,
    pub public: bool,
    /// Physical table name
    pub name: String,
    pub storage_id: String,
    pub logical_name: String,
    #[serde(default)]
    pub properties: BTreeMap<String, FieldDef>,
    #[serde(default)]
    pub checksum: String,
}

impl ModelRecord {
    pub fn new(storage_id: &str, logical: &str, tenant: &TenantKey, schema: &TableSchema) -> Self {
        Self {
            data_source: tenant.clone(),
            public: true,
            name: schema.name.clone(),
            storage_id: storage_id.to_string(),
            logical_name: logical.to_string(),
            properties: schema.structure.clone(),
            checksum: schema.checksum(),
        }
    }

    pub fn key(&self) -> String {
        model_key(&self.data_source, &self.name)
    }

    pub fn schema(&self) -> TableSchema {
        TableSchema {
            name: self.name.clone(),
            structure: self.properties.clone(),
        }
    }
}

/// Qualified key so tenants sharing a user table name never collide
pub fn model_key(tenant: &TenantKey, physical: &str) -> String {
    format!("{}/{}", tenant, physical)
}

pub struct MetadataStore {
    data_dir: PathBuf,
    datasources: JsonDocument<ConnectionParams>,
    models: JsonDocument<ModelRecord>,
    storages: JsonDocument<StorageDescriptor>,
}

impl MetadataStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            datasources: JsonDocument::new(data_dir.join(DATASOURCES_FILE)),
            models: JsonDocument::new(data_dir.join(MODEL_CONFIG_FILE)),
            storages: JsonDocument::new(data_dir.join(STORAGES_FILE)),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn save_datasource(&self, params: &ConnectionParams) -> Result<()> {
        self.datasources.upsert(params.tenant_key().as_str(), params.clone())
    }

    pub fn datasources(&self) -> Result<BTreeMap<String, ConnectionParams>> {
        self.datasources.load()
    }

    pub fn save_model(&self, record: &ModelRecord) -> Result<()> {
        self.models.upsert(&record.key(), record.clone())
    }

    pub fn model(&self, key: &str) -> Result<Option<ModelRecord>> {
        self.models.get(key)
    }

    pub fn models(&self) -> Result<BTreeMap<String, ModelRecord>> {
        self.models.load()
    }

    pub fn save_storage(&self, storage: &StorageDescriptor) -> Result<()> {
        self.storages.upsert(&storage.id, storage.clone())
    }

    pub fn storages(&self) -> Result<BTreeMap<String, StorageDescriptor>> {
        self.storages.load()
    }
}
