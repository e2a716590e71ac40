use crate::engine::EngineType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a tenant database: `engineType:dbName`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantKey(String);

impl TenantKey {
    pub fn new(engine: EngineType, db_name: &str) -> Self {
        Self(format!("{}:{}", engine, db_name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection parameters of one tenant, as stored in `datasources.json`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionParams {
    pub name: String,
    pub connector: EngineType,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_create_database")]
    pub create_database: bool,
}

fn default_create_database() -> bool {
    true
}

impl ConnectionParams {
    pub fn tenant_key(&self) -> TenantKey {
        TenantKey::new(self.connector, &self.database)
    }
}

// Hand-written so passwords never reach the logs
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("name", &self.name)
            .field("connector", &self.connector)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("create_database", &self.create_database)
            .finish()
    }
}
