//! The gateway: every registry and service of one process, wired together.

use crate::connection::ConnectionRegistry;
use crate::engine::EngineSet;
use crate::error::Result;
use crate::ops::{AccountImporter, TenantOps};
use crate::provision::{ProvisionHandle, ProvisionReport, Provisioner};
use crate::registry::{
    MetadataStore, ModelRegistry, NewStorage, RestoreReport, StorageDescriptor, StorageStore,
};
use crate::schema::SYSTEM_TABLES;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Gateway {
    pub metadata: Arc<MetadataStore>,
    pub storages: Arc<StorageStore>,
    pub connections: Arc<ConnectionRegistry>,
    pub models: Arc<ModelRegistry>,
    pub provisioner: Arc<Provisioner>,
    pub ops: TenantOps,
}

impl Gateway {
    /// Open the gateway over `data_dir`, loading stored descriptors.
    /// Connections and models come back with [`Gateway::restore`].
    pub fn open(data_dir: &Path, engines: EngineSet, importer: AccountImporter) -> Result<Self> {
        let metadata = Arc::new(MetadataStore::new(data_dir));
        let storages = Arc::new(StorageStore::open(metadata.clone())?);
        let connections = Arc::new(ConnectionRegistry::new(engines));
        let models = Arc::new(ModelRegistry::new(
            storages.clone(),
            connections.clone(),
            metadata.clone(),
        ));
        let provisioner = Arc::new(Provisioner::new(
            connections.clone(),
            models.clone(),
            metadata.clone(),
        ));
        let ops = TenantOps::new(models.clone(), Arc::new(importer));

        info!("Gateway opened on {}", data_dir.display());

        Ok(Self {
            metadata,
            storages,
            connections,
            models,
            provisioner,
            ops,
        })
    }

    /// Re-attach persisted datasources and models, then provision every
    /// stored descriptor that still lacks tables. A storage whose first dial
    /// failed has neither, so this is where it gets retried.
    pub async fn restore(&self) -> Result<RestoreReport> {
        let mut report = self.models.restore().await?;

        for storage in self.storages.list() {
            let tenant = storage.tenant_key();
            if let Some(connection) = self.connections.get(&tenant) {
                if !connection.is_live() {
                    // Already counted under failed_datasources
                    continue;
                }
            }

            let missing = self.missing_tables(&storage);
            if missing.is_empty() {
                continue;
            }

            info!(
                "Storage {} is missing {} tables, provisioning again",
                storage.id,
                missing.len()
            );
            match self.provisioner.provision(storage.clone()).await {
                Ok(provisioned) if provisioned.is_complete() => {
                    report.reprovisioned.push(storage.id.clone())
                }
                Ok(provisioned) => {
                    warn!(
                        "Storage {} still has {} failed tables",
                        storage.id,
                        provisioned.failed().count()
                    );
                    report.reprovisioned.push(storage.id.clone());
                    report.failed_storages.push(storage.id.clone());
                }
                Err(e) => {
                    warn!("Failed to provision storage {}: {}", storage.id, e);
                    report.failed_storages.push(storage.id.clone());
                }
            }
        }

        Ok(report)
    }

    /// Physical tables a storage should own that are not registered
    fn missing_tables(&self, storage: &StorageDescriptor) -> Vec<String> {
        let registered = self.models.tables(&storage.tenant_key());
        storage
            .db_structure
            .iter()
            .map(|table| table.name.clone())
            .chain(SYSTEM_TABLES.iter().map(|logical| storage.physical_name(logical)))
            .filter(|physical| !registered.contains(physical))
            .collect()
    }

    /// Validate and persist a new storage. Provisioning is a separate step so
    /// the descriptor exists even when the tenant database is unreachable.
    pub fn register_storage(&self, request: NewStorage) -> Result<Arc<StorageDescriptor>> {
        let descriptor = StorageDescriptor::create(request)?;
        self.storages.insert(descriptor)
    }

    /// Register and provision, waiting for every table. Dropping the returned
    /// future stops the wait, not the provisioning.
    pub async fn create_storage(
        &self,
        request: NewStorage,
    ) -> Result<(Arc<StorageDescriptor>, Result<ProvisionReport>)> {
        let storage = self.register_storage(request)?;
        // The run is detached so a dropped caller cannot cut it short
        let report = self.provisioner.spawn(storage.clone()).wait().await;
        Ok((storage, report))
    }

    /// Register and provision in the background.
    pub fn create_storage_in_background(
        &self,
        request: NewStorage,
    ) -> Result<(Arc<StorageDescriptor>, ProvisionHandle)> {
        let storage = self.register_storage(request)?;
        let handle = self.provisioner.spawn(storage.clone());
        Ok((storage, handle))
    }
}
