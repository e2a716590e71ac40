//! Tenant Provisioner
//!
//! Brings a storage descriptor to life: connect to the tenant database,
//! materialize the user's tables, then the system tables. Each table is
//! materialized by its own task. A failed table is logged and reported but
//! never stops the others, so provisioning always reaches `Done` once the
//! connection is up.

mod report;

pub use report::{ProvisionReport, ProvisionState, TableEvent, TableOutcome};

use crate::connection::ConnectionRegistry;
use crate::engine::Datasource;
use crate::error::{GatewayError, Result};
use crate::registry::{MetadataStore, ModelRegistry, StorageDescriptor};
use crate::schema::{physical_name, system_schema, TableSchema, SYSTEM_TABLES};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

pub struct Provisioner {
    connections: Arc<ConnectionRegistry>,
    models: Arc<ModelRegistry>,
    metadata: Arc<MetadataStore>,
}

/// A provisioning run in progress
pub struct ProvisionHandle {
    storage_id: String,
    state: watch::Receiver<ProvisionState>,
    events: mpsc::UnboundedReceiver<TableEvent>,
    task: JoinHandle<Result<ProvisionReport>>,
}

impl ProvisionHandle {
    pub fn storage_id(&self) -> &str {
        &self.storage_id
    }

    pub fn state(&self) -> ProvisionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProvisionState> {
        self.state.clone()
    }

    /// Next settled table, or `None` once the run has finished and every
    /// event was received.
    pub async fn next_event(&mut self) -> Option<TableEvent> {
        self.events.recv().await
    }

    pub async fn wait(self) -> Result<ProvisionReport> {
        self.task.await.map_err(|e| GatewayError::Internal(format!(
            "Provisioning of storage {} did not complete: {}",
            self.storage_id, e
        )))?
    }
}

struct Progress<'a> {
    state: &'a watch::Sender<ProvisionState>,
    events: &'a mpsc::UnboundedSender<TableEvent>,
}

impl Progress<'_> {
    fn enter(&self, state: ProvisionState) {
        debug!("Provisioning state: {}", state);
        self.state.send_replace(state);
    }

    fn emit(&self, event: &TableEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event.clone());
    }
}

impl Provisioner {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        models: Arc<ModelRegistry>,
        metadata: Arc<MetadataStore>,
    ) -> Self {
        Self {
            connections,
            models,
            metadata,
        }
    }

    /// Provision and wait for the report.
    pub async fn provision(&self, storage: Arc<StorageDescriptor>) -> Result<ProvisionReport> {
        let (state, _) = watch::channel(ProvisionState::Connecting);
        let (events, _) = mpsc::unbounded_channel();
        self.run(storage, Progress { state: &state, events: &events }).await
    }

    /// Provision in the background.
    pub fn spawn(self: &Arc<Self>, storage: Arc<StorageDescriptor>) -> ProvisionHandle {
        let (state_tx, state_rx) = watch::channel(ProvisionState::Connecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let storage_id = storage.id.clone();

        let provisioner = self.clone();
        let task = tokio::spawn(async move {
            let progress = Progress {
                state: &state_tx,
                events: &events_tx,
            };
            provisioner.run(storage, progress).await
        });

        ProvisionHandle {
            storage_id,
            state: state_rx,
            events: events_rx,
            task,
        }
    }

    async fn run(&self, storage: Arc<StorageDescriptor>, progress: Progress<'_>) -> Result<ProvisionReport> {
        let tenant = storage.tenant_key();
        let params = storage.connection_params();
        info!("Provisioning storage {} on {}", storage.id, tenant);

        progress.enter(ProvisionState::Connecting);
        let datasource = match self.connect(&storage).await {
            Ok(datasource) => datasource,
            Err(e) => {
                warn!("Provisioning of storage {} aborted: {}", storage.id, e);
                progress.enter(ProvisionState::Aborted);
                return Err(e);
            }
        };

        if let Err(e) = self.metadata.save_datasource(&params) {
            progress.enter(ProvisionState::Aborted);
            return Err(e);
        }

        let mut report = ProvisionReport::new(&storage.id, tenant.as_str());

        progress.enter(ProvisionState::MaterializingUserTables);
        let user_tables = storage
            .db_structure
            .iter()
            .map(|table| (table.name.clone(), Ok(table.clone())))
            .collect();
        self.materialize_all(&storage, &datasource, user_tables, &progress, &mut report)
            .await;

        progress.enter(ProvisionState::MaterializingSystemTables);
        let system_tables = SYSTEM_TABLES
            .iter()
            .map(|logical| {
                let schema = system_schema(storage.engine_type, logical)
                    .map(|s| s.renamed(physical_name(&storage.db_prefix_table, logical)));
                (logical.to_string(), schema)
            })
            .collect();
        self.materialize_all(&storage, &datasource, system_tables, &progress, &mut report)
            .await;

        progress.enter(ProvisionState::Done);
        info!(
            "Provisioned storage {}: {} tables materialized, {} failed",
            storage.id,
            report.materialized().count(),
            report.failed().count()
        );

        Ok(report)
    }

    async fn connect(&self, storage: &StorageDescriptor) -> Result<Arc<dyn Datasource>> {
        let connection = self
            .connections
            .get_or_create(&storage.tenant_key(), &storage.connection_params())
            .await?;
        Ok(connection.datasource()?.clone())
    }

    async fn materialize_all(
        &self,
        storage: &StorageDescriptor,
        datasource: &Arc<dyn Datasource>,
        tables: Vec<(String, Result<TableSchema>)>,
        progress: &Progress<'_>,
        report: &mut ProvisionReport,
    ) {
        let tenant = storage.tenant_key();
        let mut tasks = JoinSet::new();

        for (logical, schema) in tables {
            let schema = match schema {
                Ok(schema) => schema,
                Err(e) => {
                    warn!("No definition for {} in {}: {}", logical, tenant, e);
                    let event = TableEvent {
                        physical: storage.physical_name(&logical),
                        logical,
                        outcome: TableOutcome::Failed { cause: e.to_string() },
                    };
                    progress.emit(&event);
                    report.tables.push(event);
                    continue;
                }
            };

            let datasource = datasource.clone();
            let models = self.models.clone();
            let storage_id = storage.id.clone();
            let tenant = tenant.clone();

            tasks.spawn(async move {
                let outcome = match datasource
                    .materialize(&schema)
                    .await
                    .and_then(|handle| models.register(&storage_id, &logical, &tenant, &schema, handle))
                {
                    Ok(()) => TableOutcome::Materialized,
                    Err(e) => {
                        warn!("Failed to materialize {} in {}: {}", schema.name, tenant, e);
                        TableOutcome::Failed { cause: e.to_string() }
                    }
                };

                TableEvent {
                    logical,
                    physical: schema.name,
                    outcome,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(event) => {
                    progress.emit(&event);
                    report.tables.push(event);
                }
                Err(e) => warn!("Materialization task for {} failed to complete: {}", tenant, e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::engine::EngineSet;
    use crate::registry::{NewStorage, StorageStore};
    use serde_json::json;
    use tempfile::TempDir;

    struct Fixture {
        temp_dir: TempDir,
        engine: Arc<ScriptedEngine>,
        storages: Arc<StorageStore>,
        models: Arc<ModelRegistry>,
        provisioner: Arc<Provisioner>,
    }

    fn fixture(engine: ScriptedEngine) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let engine = Arc::new(engine);
        let metadata = Arc::new(MetadataStore::new(temp_dir.path()));
        let storages = Arc::new(StorageStore::open(metadata.clone()).unwrap());
        let connections = Arc::new(ConnectionRegistry::new(EngineSet::new().with(engine.clone())));
        let models = Arc::new(ModelRegistry::new(
            storages.clone(),
            connections.clone(),
            metadata.clone(),
        ));
        let provisioner = Arc::new(Provisioner::new(connections, models.clone(), metadata));
        Fixture {
            temp_dir,
            engine,
            storages,
            models,
            provisioner,
        }
    }

    fn storage(fx: &Fixture, db_name: &str, tables: &[&str]) -> Arc<StorageDescriptor> {
        let structure: Vec<_> = tables
            .iter()
            .map(|name| json!({"name": name, "structure": {"label": "string"}}))
            .collect();
        let request: NewStorage = serde_json::from_value(json!({
            "engineType": "memory",
            "dbName": db_name,
            "dbPrefixTable": "crm",
            "dbStructure": structure
        }))
        .unwrap();
        fx.storages
            .insert(StorageDescriptor::create(request).unwrap())
            .unwrap()
    }

    #[tokio::test]
    async fn test_provision_materializes_user_and_system_tables() {
        let fx = fixture(ScriptedEngine::new());
        let crm = storage(&fx, "crm", &["leads", "deals"]);

        let report = fx.provisioner.provision(crm.clone()).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.tables.len(), 4);
        assert_eq!(fx.engine.materializations(), 4);
        assert_eq!(report.event("crm_account").unwrap().logical, "account");

        for logical in ["leads", "deals", "account", "task"] {
            assert!(fx.models.resolve(&crm.id, logical).is_ok(), "{} unresolved", logical);
        }

        let db = fx.engine.memory().database("crm").unwrap();
        assert_eq!(db.collection_names(), vec!["crm_account", "crm_task", "deals", "leads"]);
        assert!(fx.temp_dir.path().join("datasources.json").exists());
    }

    #[tokio::test]
    async fn test_failed_table_does_not_stop_the_others() {
        let fx = fixture(ScriptedEngine::new().failing_table("b"));
        let crm = storage(&fx, "crm", &["a", "b", "c"]);

        let report = fx.provisioner.provision(crm.clone()).await.unwrap();

        let failed: Vec<_> = report.failed().map(|t| t.physical.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        assert_eq!(report.materialized().count(), 4);

        assert!(fx.models.resolve(&crm.id, "a").is_ok());
        assert!(fx.models.resolve(&crm.id, "c").is_ok());
        assert!(fx.models.resolve(&crm.id, "task").is_ok());
        assert!(matches!(
            fx.models.resolve(&crm.id, "b"),
            Err(GatewayError::ModelNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_failure_aborts_before_any_table() {
        let fx = fixture(ScriptedEngine::new().unreachable("crm"));
        let crm = storage(&fx, "crm", &["leads"]);

        let err = fx.provisioner.provision(crm.clone()).await.unwrap_err();

        assert!(matches!(err, GatewayError::ConnectionFailed { .. }));
        assert_eq!(fx.engine.materializations(), 0);
        assert!(!fx.temp_dir.path().join("datasources.json").exists());
        assert!(fx.storages.get(&crm.id).is_some());
    }

    #[tokio::test]
    async fn test_spawned_run_streams_events() {
        let fx = fixture(ScriptedEngine::new().failing_table("crm_task"));
        let crm = storage(&fx, "crm", &["leads"]);

        let mut handle = fx.provisioner.spawn(crm.clone());
        assert_eq!(handle.storage_id(), crm.id);
        let mut state = handle.subscribe();

        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().filter(|e| !e.is_ok()).count(), 1);

        state.wait_for(|s| s.is_terminal()).await.unwrap();
        assert_eq!(handle.state(), ProvisionState::Done);

        let report = handle.wait().await.unwrap();
        assert_eq!(report.event("crm_task").unwrap().logical, "task");
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_spawned_run_reports_abort() {
        let fx = fixture(ScriptedEngine::new().unreachable("crm"));
        let crm = storage(&fx, "crm", &[]);

        let handle = fx.provisioner.spawn(crm);
        let mut state = handle.subscribe();
        state.wait_for(|s| s.is_terminal()).await.unwrap();

        assert_eq!(handle.state(), ProvisionState::Aborted);
        assert!(handle.wait().await.is_err());
    }
}
