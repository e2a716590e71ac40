use super::{find_existing, not_found, DeleteSummary, TenantOps};
use crate::error::Result;
use crate::schema::{Filter, Record};

/// Generic access to any table of a tenant, by logical name.
impl TenantOps {
    pub async fn create_or_update_data(&self, storage_id: &str, table: &str, body: Record) -> Result<Record> {
        self.model(storage_id, table)?.replace_or_create(body).await
    }

    pub async fn get_all_data(&self, storage_id: &str, table: &str) -> Result<Vec<Record>> {
        self.model(storage_id, table)?.find(&Filter::new()).await
    }

    pub async fn get_one_data(&self, storage_id: &str, table: &str, id: &str) -> Result<Record> {
        let handle = self.model(storage_id, table)?;
        find_existing(handle.as_ref(), id).await
    }

    pub async fn delete_one_data(&self, storage_id: &str, table: &str, id: &str) -> Result<DeleteSummary> {
        let handle = self.model(storage_id, table)?;
        match handle.destroy_by_id(id).await? {
            0 => Err(not_found(handle.as_ref(), id)),
            count => Ok(DeleteSummary { count }),
        }
    }

    pub async fn delete_all_data(&self, storage_id: &str, table: &str) -> Result<DeleteSummary> {
        let count = self.model(storage_id, table)?.destroy_all(&Filter::new()).await?;
        Ok(DeleteSummary { count })
    }
}
