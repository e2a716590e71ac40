//! Storage descriptors
//!
//! A storage is a client's request for a tenant database. Descriptors are
//! validated once, assigned an id, persisted to `storages.json` and never
//! modified afterwards.

use crate::connection::{ConnectionParams, TenantKey};
use crate::engine::EngineType;
use crate::error::{GatewayError, Result};
use crate::registry::metadata::MetadataStore;
use crate::schema::{is_valid_identifier, physical_for, physical_name, TableSchema, SYSTEM_TABLES};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Body of `POST /storages`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStorage {
    pub engine_type: EngineType,
    pub db_name: String,
    #[serde(default = "default_host")]
    pub db_ip: String,
    #[serde(default = "default_port")]
    pub db_port: u16,
    #[serde(default)]
    pub db_user_name: String,
    #[serde(default)]
    pub db_password: String,
    pub db_prefix_table: String,
    #[serde(default)]
    pub db_structure: Vec<TableSchema>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

impl NewStorage {
    pub fn validate(&self) -> Result<()> {
        if self.db_name.trim().is_empty() {
            return invalid("dbName must not be empty".to_string());
        }

        if self.engine_type == EngineType::Postgresql && !is_valid_identifier(&self.db_name) {
            return invalid(format!("Invalid database name: '{}'", self.db_name));
        }

        if !is_valid_identifier(&self.db_prefix_table) {
            return invalid(format!("Invalid table prefix: '{}'", self.db_prefix_table));
        }

        let reserved: HashSet<String> = SYSTEM_TABLES
            .iter()
            .map(|logical| physical_name(&self.db_prefix_table, logical))
            .collect();

        let mut seen = HashSet::new();
        for table in &self.db_structure {
            table.validate()?;

            if !seen.insert(table.name.as_str()) {
                return invalid(format!("Table '{}' is declared more than once", table.name));
            }

            if reserved.contains(&table.name) {
                return invalid(format!(
                    "Table name '{}' is reserved for a system table",
                    table.name
                ));
            }
        }

        Ok(())
    }
}

fn invalid<T>(message: String) -> Result<T> {
    Err(GatewayError::InvalidRequest { message })
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageDescriptor {
    pub id: String,
    pub engine_type: EngineType,
    pub db_name: String,
    pub db_ip: String,
    pub db_port: u16,
    pub db_user_name: String,
    pub db_password: String,
    pub db_prefix_table: String,
    pub db_structure: Vec<TableSchema>,
    pub created_at: DateTime<Utc>,
}

impl StorageDescriptor {
    pub fn create(request: NewStorage) -> Result<Self> {
        request.validate()?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            engine_type: request.engine_type,
            db_name: request.db_name,
            db_ip: request.db_ip,
            db_port: request.db_port,
            db_user_name: request.db_user_name,
            db_password: request.db_password,
            db_prefix_table: request.db_prefix_table,
            db_structure: request.db_structure,
            created_at: Utc::now(),
        })
    }

    pub fn tenant_key(&self) -> TenantKey {
        TenantKey::new(self.engine_type, &self.db_name)
    }

    pub fn connection_params(&self) -> ConnectionParams {
        ConnectionParams {
            name: self.tenant_key().to_string(),
            connector: self.engine_type,
            host: self.db_ip.clone(),
            port: self.db_port,
            database: self.db_name.clone(),
            username: self.db_user_name.clone(),
            password: self.db_password.clone(),
            create_database: true,
        }
    }

    pub fn physical_name(&self, logical: &str) -> String {
        physical_for(&self.db_prefix_table, logical)
    }
}

impl std::fmt::Debug for StorageDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDescriptor")
            .field("id", &self.id)
            .field("engine_type", &self.engine_type)
            .field("db_name", &self.db_name)
            .field("db_ip", &self.db_ip)
            .field("db_port", &self.db_port)
            .field("db_prefix_table", &self.db_prefix_table)
            .field("tables", &self.db_structure.len())
            .finish()
    }
}

/// Descriptors by id, backed by `storages.json`
pub struct StorageStore {
    metadata: Arc<MetadataStore>,
    storages: DashMap<String, Arc<StorageDescriptor>>,
}

impl StorageStore {
    /// Load every persisted descriptor.
    pub fn open(metadata: Arc<MetadataStore>) -> Result<Self> {
        let storages = DashMap::new();
        for (id, descriptor) in metadata.storages()? {
            storages.insert(id, Arc::new(descriptor));
        }

        if !storages.is_empty() {
            info!("Loaded {} storage descriptors", storages.len());
        }

        Ok(Self { metadata, storages })
    }

    /// Persist, then make the descriptor visible.
    pub fn insert(&self, descriptor: StorageDescriptor) -> Result<Arc<StorageDescriptor>> {
        self.metadata.save_storage(&descriptor)?;

        let descriptor = Arc::new(descriptor);
        self.storages.insert(descriptor.id.clone(), descriptor.clone());

        info!(
            "Stored storage {} for tenant {}",
            descriptor.id,
            descriptor.tenant_key()
        );
        Ok(descriptor)
    }

    pub fn get(&self, id: &str) -> Option<Arc<StorageDescriptor>> {
        self.storages.get(id).map(|entry| entry.value().clone())
    }

    /// All descriptors, oldest first
    pub fn list(&self) -> Vec<Arc<StorageDescriptor>> {
        let mut storages: Vec<_> = self.storages.iter().map(|e| e.value().clone()).collect();
        storages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        storages
    }

    pub fn len(&self) -> usize {
        self.storages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storages.is_empty()
    }
}
