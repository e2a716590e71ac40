use crate::engine::PoolSettings;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// How `POST /storages` treats provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionMode {
    /// Respond once every table has settled, with the report
    Wait,
    /// Respond immediately; tables are materialized in the background
    Background,
}

impl FromStr for ProvisionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(ProvisionMode::Wait),
            "background" => Ok(ProvisionMode::Background),
            other => Err(anyhow::anyhow!("Unknown provision mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_host: String,
    pub gateway_port: u16,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub provision_mode: ProvisionMode,
    pub max_connections_per_pool: u32,
    pub pool_timeout: Duration,
    pub admin_database: String,
    pub import_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_host: "127.0.0.1".to_string(),
            gateway_port: 9000,
            data_dir: PathBuf::from("./data"),
            log_dir: PathBuf::from("/var/log/tenantdb-gateway"),
            provision_mode: ProvisionMode::Wait,
            max_connections_per_pool: 10,
            pool_timeout: Duration::from_secs(5),
            admin_database: "postgres".to_string(),
            import_timeout: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Config::default();

        let gateway_host = lookup("GATEWAY_HOST").unwrap_or(defaults.gateway_host);

        let gateway_port = lookup("GATEWAY_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.gateway_port);

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let log_dir = lookup("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let provision_mode = match lookup("PROVISION_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.provision_mode,
        };

        let max_connections_per_pool = lookup("MAX_CONNECTIONS_PER_POOL")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_connections_per_pool);

        let pool_timeout = lookup("POOL_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.pool_timeout);

        let admin_database = lookup("ADMIN_DATABASE").unwrap_or(defaults.admin_database);

        let import_timeout = lookup("IMPORT_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.import_timeout);

        Ok(Config {
            gateway_host,
            gateway_port,
            data_dir,
            log_dir,
            provision_mode,
            max_connections_per_pool,
            pool_timeout,
            admin_database,
            import_timeout,
        })
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.gateway_host, self.gateway_port);
        addr.parse().map_err(|e| anyhow::anyhow!("Invalid socket address: {}", e))
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.max_connections_per_pool,
            timeout: self.pool_timeout,
            admin_database: self.admin_database.clone(),
        }
    }
}
