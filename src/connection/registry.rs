use crate::connection::{ConnectionParams, TenantKey};
use crate::engine::{Datasource, EngineSet};
use crate::error::{GatewayError, Result};
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// A tenant connection, live or errored. Errored connections are kept so
/// later callers fail fast instead of re-dialing.
pub enum Connection {
    Live {
        key: TenantKey,
        datasource: Arc<dyn Datasource>,
    },
    Errored {
        key: TenantKey,
        cause: String,
    },
}

impl Connection {
    pub fn key(&self) -> &TenantKey {
        match self {
            Connection::Live { key, .. } | Connection::Errored { key, .. } => key,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Connection::Live { .. })
    }

    pub fn datasource(&self) -> Result<&Arc<dyn Datasource>> {
        match self {
            Connection::Live { datasource, .. } => Ok(datasource),
            Connection::Errored { key, cause } => Err(GatewayError::ConnectionUnavailable {
                tenant: key.to_string(),
                cause: cause.clone(),
            }),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connection::Live { key, .. } => f.debug_struct("Live").field("key", key).finish(),
            Connection::Errored { key, cause } => f
                .debug_struct("Errored")
                .field("key", key)
                .field("cause", cause)
                .finish(),
        }
    }
}

/// Process-wide cache of tenant connections.
///
/// The first caller for a key dials; concurrent callers for the same key
/// await the same in-flight dial and receive the same `Arc<Connection>`.
/// Nothing is evicted and failed dials are never retried.
pub struct ConnectionRegistry {
    engines: EngineSet,
    connections: DashMap<TenantKey, Arc<OnceCell<Arc<Connection>>>>,
    dial_attempts: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new(engines: EngineSet) -> Self {
        Self {
            engines,
            connections: DashMap::new(),
            dial_attempts: AtomicU64::new(0),
        }
    }

    pub fn engines(&self) -> &EngineSet {
        &self.engines
    }

    pub async fn get_or_create(
        &self,
        key: &TenantKey,
        params: &ConnectionParams,
    ) -> Result<Arc<Connection>> {
        // Clone the cell out so no map shard lock is held across the dial
        let cell = self.connections.entry(key.clone()).or_default().clone();

        let connection = cell
            .get_or_init(|| self.dial(key, params))
            .await
            .clone();

        match connection.as_ref() {
            Connection::Live { .. } => Ok(connection),
            Connection::Errored { cause, .. } => Err(GatewayError::ConnectionFailed {
                tenant: key.to_string(),
                cause: cause.clone(),
            }),
        }
    }

    /// A connection whose dial has completed, live or errored.
    pub fn get(&self, key: &TenantKey) -> Option<Arc<Connection>> {
        self.connections
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    async fn dial(&self, key: &TenantKey, params: &ConnectionParams) -> Arc<Connection> {
        self.dial_attempts.fetch_add(1, Ordering::Relaxed);
        debug!("Dialing {} ({}:{})", key, params.host, params.port);

        let Some(engine) = self.engines.get(params.connector) else {
            warn!("No engine registered for {}", params.connector);
            return Arc::new(Connection::Errored {
                key: key.clone(),
                cause: format!("engine '{}' is not enabled", params.connector),
            });
        };

        match engine.connect(params).await {
            Ok(datasource) => {
                info!("Datasource {} connected", key);
                Arc::new(Connection::Live {
                    key: key.clone(),
                    datasource,
                })
            }
            Err(e) => {
                warn!("Datasource {} failed to connect: {}", key, e);
                Arc::new(Connection::Errored {
                    key: key.clone(),
                    cause: e.to_string(),
                })
            }
        }
    }

    pub fn dial_attempts(&self) -> u64 {
        self.dial_attempts.load(Ordering::Relaxed)
    }

    pub fn live_connections(&self) -> usize {
        self.count(|c| c.is_live())
    }

    pub fn errored_connections(&self) -> usize {
        self.count(|c| !c.is_live())
    }

    fn count(&self, predicate: impl Fn(&Connection) -> bool) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().get().map(|c| predicate(c.as_ref())).unwrap_or(false))
            .count()
    }
}
