use super::{find_existing, first_updated, not_found, DeleteSummary, ImportSummary, TenantOps};
use crate::error::Result;
use crate::schema::{filter_by_id, record_id, Filter, Record, ACCOUNT};
use tracing::info;

impl TenantOps {
    pub async fn get_one_account(&self, storage_id: &str, account_id: &str) -> Result<Record> {
        let accounts = self.model(storage_id, ACCOUNT)?;
        find_existing(accounts.as_ref(), account_id).await
    }

    pub async fn get_all_accounts(&self, storage_id: &str) -> Result<Vec<Record>> {
        let accounts = self.model(storage_id, ACCOUNT)?;
        accounts.find(&Filter::new()).await
    }

    /// Update the account named by `id`, or create one when no id is given.
    pub async fn create_or_update_account(&self, storage_id: &str, body: Record) -> Result<Record> {
        let accounts = self.model(storage_id, ACCOUNT)?;

        match record_id(&body) {
            Some(id) => {
                find_existing(accounts.as_ref(), &id).await?;
                let updated = accounts.update(&filter_by_id(&id), body).await?;
                first_updated(accounts.as_ref(), &id, updated)
            }
            None => accounts.create(body).await,
        }
    }

    pub async fn delete_one_account(&self, storage_id: &str, account_id: &str) -> Result<DeleteSummary> {
        let accounts = self.model(storage_id, ACCOUNT)?;
        match accounts.destroy_by_id(account_id).await? {
            0 => Err(not_found(accounts.as_ref(), account_id)),
            count => Ok(DeleteSummary { count }),
        }
    }

    /// Download a CSV of accounts and insert every row.
    pub async fn import_accounts(&self, storage_id: &str, url: &str) -> Result<ImportSummary> {
        let accounts = self.model(storage_id, ACCOUNT)?;

        let records = self.importer.fetch(url).await?;
        let created = accounts.create_many(records).await?;

        info!("Imported {} accounts into {}", created.len(), accounts.table_name());
        Ok(ImportSummary {
            imported: created.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::GatewayError;
    use crate::ops::testing::{record, tenant};
    use serde_json::json;

    #[tokio::test]
    async fn test_account_lifecycle() {
        let t = tenant().await;

        let created = t
            .ops
            .create_or_update_account(&t.storage_id, record(json!({"profileKey": "p-1", "name": "Ada"})))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], json!("active"));

        let updated = t
            .ops
            .create_or_update_account(&t.storage_id, record(json!({"id": id, "name": "Ada L."})))
            .await
            .unwrap();
        assert_eq!(updated["name"], json!("Ada L."));
        assert_eq!(updated["profileKey"], json!("p-1"));

        let fetched = t.ops.get_one_account(&t.storage_id, &id).await.unwrap();
        assert_eq!(fetched["name"], json!("Ada L."));
        assert_eq!(t.ops.get_all_accounts(&t.storage_id).await.unwrap().len(), 1);

        let deleted = t.ops.delete_one_account(&t.storage_id, &id).await.unwrap();
        assert_eq!(deleted.count, 1);
        assert!(matches!(
            t.ops.get_one_account(&t.storage_id, &id).await,
            Err(GatewayError::RecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_of_unknown_account_fails() {
        let t = tenant().await;
        let err = t
            .ops
            .create_or_update_account(&t.storage_id, record(json!({"id": "nope", "name": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::RecordNotFound { .. }));
        assert!(t.ops.get_all_accounts(&t.storage_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_field_is_rejected() {
        let t = tenant().await;
        let err = t
            .ops
            .create_or_update_account(&t.storage_id, record(json!({"name": "no key"})))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_import_resolves_before_downloading() {
        let t = tenant().await;

        let err = t
            .ops
            .import_accounts("unknown", "http://127.0.0.1:1/a.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::StorageNotFound { .. }));

        let err = t
            .ops
            .import_accounts(&t.storage_id, "http://127.0.0.1:1/a.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ImportFailed { .. }));
    }
}
