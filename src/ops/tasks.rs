use super::{find_existing, first_updated, DeleteSummary, TenantOps};
use crate::error::{GatewayError, Result};
use crate::schema::{record_id, Filter, Record, ACCOUNT, ID_FIELD, PROFILE_KEY, TASK, TASK_MESSAGES};
use serde_json::Value;
use tracing::debug;

/// Shallow merge of task messages; keys from `incoming` win.
pub fn merge_task_messages(existing: Option<&Value>, incoming: Option<Value>) -> Value {
    let mut merged = match existing {
        Some(Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };

    if let Some(Value::Object(map)) = incoming {
        merged.extend(map);
    }

    Value::Object(merged)
}

impl TenantOps {
    /// The account's profile key, which scopes every task query.
    async fn profile_key(&self, storage_id: &str, account_id: &str) -> Result<Value> {
        let accounts = self.model(storage_id, ACCOUNT)?;
        let account = find_existing(accounts.as_ref(), account_id).await?;

        match account.get(PROFILE_KEY) {
            Some(key) if !key.is_null() => Ok(key.clone()),
            _ => Err(GatewayError::InvalidRequest {
                message: format!("Account '{}' has no {}", account_id, PROFILE_KEY),
            }),
        }
    }

    fn profile_filter(profile_key: &Value) -> Filter {
        let mut filter = Filter::new();
        filter.insert(PROFILE_KEY.to_string(), profile_key.clone());
        filter
    }

    /// Create a task for an account, or update one of its tasks when the body
    /// carries an id. Updates merge `taskMessages` into the stored ones.
    pub async fn create_or_update_task(
        &self,
        storage_id: &str,
        account_id: &str,
        mut body: Record,
    ) -> Result<Record> {
        let profile_key = self.profile_key(storage_id, account_id).await?;
        let tasks = self.model(storage_id, TASK)?;

        body.insert(PROFILE_KEY.to_string(), profile_key.clone());

        let Some(id) = record_id(&body) else {
            return tasks.create(body).await;
        };

        let existing = find_existing(tasks.as_ref(), &id).await?;
        let messages = merge_task_messages(existing.get(TASK_MESSAGES), body.remove(TASK_MESSAGES));
        body.insert(TASK_MESSAGES.to_string(), messages);

        let mut filter = Self::profile_filter(&profile_key);
        filter.insert(ID_FIELD.to_string(), Value::String(id.clone()));

        debug!("Updating task {} for account {}", id, account_id);
        let updated = tasks.update(&filter, body).await?;
        first_updated(tasks.as_ref(), &id, updated)
    }

    pub async fn get_all_tasks(&self, storage_id: &str, account_id: &str) -> Result<Vec<Record>> {
        let profile_key = self.profile_key(storage_id, account_id).await?;
        let tasks = self.model(storage_id, TASK)?;
        tasks.find(&Self::profile_filter(&profile_key)).await
    }

    pub async fn delete_all_tasks(&self, storage_id: &str, account_id: &str) -> Result<DeleteSummary> {
        let profile_key = self.profile_key(storage_id, account_id).await?;
        let tasks = self.model(storage_id, TASK)?;
        let count = tasks.destroy_all(&Self::profile_filter(&profile_key)).await?;
        Ok(DeleteSummary { count })
    }
}
