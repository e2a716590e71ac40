//! Scripted engine for tests: wraps the memory engine, counts dials and
//! materializations, and fails or slows chosen databases or tables on demand.

use crate::connection::ConnectionParams;
use crate::engine::{Datasource, Engine, EngineType, MemoryEngine, ModelHandle};
use crate::error::{GatewayError, Result};
use crate::schema::TableSchema;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub(crate) struct ScriptedEngine {
    inner: MemoryEngine,
    dials: AtomicUsize,
    materializations: Arc<AtomicUsize>,
    dial_delay: Duration,
    materialize_delay: Duration,
    unreachable: HashSet<String>,
    failing_tables: Arc<HashSet<String>>,
}

impl ScriptedEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_dial_delay(mut self, delay: Duration) -> Self {
        self.dial_delay = delay;
        self
    }

    pub(crate) fn with_materialize_delay(mut self, delay: Duration) -> Self {
        self.materialize_delay = delay;
        self
    }

    pub(crate) fn unreachable(mut self, database: &str) -> Self {
        self.unreachable.insert(database.to_string());
        self
    }

    pub(crate) fn failing_table(mut self, table: &str) -> Self {
        Arc::make_mut(&mut self.failing_tables).insert(table.to_string());
        self
    }

    pub(crate) fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    pub(crate) fn materializations(&self) -> usize {
        self.materializations.load(Ordering::SeqCst)
    }

    pub(crate) fn memory(&self) -> &MemoryEngine {
        &self.inner
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Memory
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Datasource>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if !self.dial_delay.is_zero() {
            tokio::time::sleep(self.dial_delay).await;
        }

        if self.unreachable.contains(&params.database) {
            return Err(GatewayError::ConnectionFailed {
                tenant: params.name.clone(),
                cause: "connection refused".to_string(),
            });
        }

        let inner = self.inner.connect(params).await?;
        Ok(Arc::new(ScriptedDatasource {
            inner,
            materializations: self.materializations.clone(),
            materialize_delay: self.materialize_delay,
            failing_tables: self.failing_tables.clone(),
        }))
    }
}

struct ScriptedDatasource {
    inner: Arc<dyn Datasource>,
    materializations: Arc<AtomicUsize>,
    materialize_delay: Duration,
    failing_tables: Arc<HashSet<String>>,
}

#[async_trait]
impl Datasource for ScriptedDatasource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn materialize(&self, schema: &TableSchema) -> Result<Arc<dyn ModelHandle>> {
        self.materializations.fetch_add(1, Ordering::SeqCst);
        if !self.materialize_delay.is_zero() {
            tokio::time::sleep(self.materialize_delay).await;
        }

        if self.failing_tables.contains(&schema.name) {
            return Err(GatewayError::MaterializationFailed {
                tenant: self.inner.name().to_string(),
                table: schema.name.clone(),
                cause: "rejected by engine".to_string(),
            });
        }

        self.inner.materialize(schema).await
    }

    fn attach(&self, schema: &TableSchema) -> Result<Arc<dyn ModelHandle>> {
        self.inner.attach(schema)
    }
}
