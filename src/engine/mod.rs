//! Storage engines
//!
//! An [`Engine`] dials a tenant database and yields a [`Datasource`]; a
//! datasource materializes table schemas into [`ModelHandle`]s. Each
//! supported engine type has one implementation:
//!
//! - `postgresql`: relational, one typed column per field
//! - `memory`: in-process document collections

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryEngine;
pub use postgres::{PoolSettings, PostgresEngine};

use crate::connection::ConnectionParams;
use crate::error::{GatewayError, Result};
use crate::schema::{filter_by_id, Filter, Record, TableSchema};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    #[serde(alias = "postgres")]
    Postgresql,
    Memory,
}

impl EngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Postgresql => "postgresql",
            EngineType::Memory => "memory",
        }
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(EngineType::Postgresql),
            "memory" => Ok(EngineType::Memory),
            other => Err(GatewayError::InvalidRequest {
                message: format!("Unsupported engine type: {}", other),
            }),
        }
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    fn engine_type(&self) -> EngineType;

    /// Open a connection to the database described by `params`.
    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Datasource>>;
}

#[async_trait]
pub trait Datasource: Send + Sync {
    fn name(&self) -> &str;

    /// Create the physical table for `schema` if it does not exist yet and
    /// return a handle to it. Calling this for an existing table succeeds.
    async fn materialize(&self, schema: &TableSchema) -> Result<Arc<dyn ModelHandle>>;

    /// Handle to a table materialized earlier; never touches the database schema.
    fn attach(&self, schema: &TableSchema) -> Result<Arc<dyn ModelHandle>>;
}

#[async_trait]
pub trait ModelHandle: Send + Sync {
    fn table_name(&self) -> &str;

    async fn find(&self, filter: &Filter) -> Result<Vec<Record>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
        Ok(self.find(&filter_by_id(id)).await?.into_iter().next())
    }

    async fn create(&self, record: Record) -> Result<Record>;

    async fn create_many(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let mut created = Vec::with_capacity(records.len());
        for record in records {
            created.push(self.create(record).await?);
        }
        Ok(created)
    }

    /// Write `patch` over every record matching `filter`; returns the updated records.
    async fn update(&self, filter: &Filter, patch: Record) -> Result<Vec<Record>>;

    async fn replace_or_create(&self, record: Record) -> Result<Record>;

    async fn destroy_by_id(&self, id: &str) -> Result<u64>;

    async fn destroy_all(&self, filter: &Filter) -> Result<u64>;
}

/// The engines available to this process, keyed by type.
#[derive(Clone, Default)]
pub struct EngineSet {
    engines: HashMap<EngineType, Arc<dyn Engine>>,
}

impl EngineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, engine: Arc<dyn Engine>) -> Self {
        self.engines.insert(engine.engine_type(), engine);
        self
    }

    pub fn get(&self, engine_type: EngineType) -> Option<Arc<dyn Engine>> {
        self.engines.get(&engine_type).cloned()
    }

    pub fn types(&self) -> Vec<EngineType> {
        let mut types: Vec<EngineType> = self.engines.keys().copied().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_type_parsing() {
        assert_eq!("postgresql".parse::<EngineType>().unwrap(), EngineType::Postgresql);
        assert_eq!("Postgres".parse::<EngineType>().unwrap(), EngineType::Postgresql);
        assert_eq!("memory".parse::<EngineType>().unwrap(), EngineType::Memory);
        assert!("mysql".parse::<EngineType>().is_err());
    }

    #[test]
    fn test_engine_type_serde() {
        let parsed: EngineType = serde_json::from_str("\"postgres\"").unwrap();
        assert_eq!(parsed, EngineType::Postgresql);
        assert_eq!(serde_json::to_string(&EngineType::Memory).unwrap(), "\"memory\"");
    }

    #[test]
    fn test_engine_set_lookup() {
        let engines = EngineSet::new().with(Arc::new(MemoryEngine::new()));
        assert!(engines.get(EngineType::Memory).is_some());
        assert!(engines.get(EngineType::Postgresql).is_none());
        assert_eq!(engines.types(), vec![EngineType::Memory]);
    }
}
