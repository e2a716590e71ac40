use super::sql;
use crate::engine::ModelHandle;
use crate::error::{GatewayError, Result};
use crate::schema::{into_record, normalize_filter, prepare_insert, Filter, Record, TableSchema};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use serde_json::Value;
use std::fmt::Display;
use tokio_postgres::Row;
use tracing::debug;

/// Handle to one relational table of a tenant database
pub struct PostgresTable {
    tenant: String,
    pool: Pool,
    schema: TableSchema,
}

impl PostgresTable {
    pub fn new(tenant: &str, pool: Pool, schema: TableSchema) -> Self {
        Self {
            tenant: tenant.to_string(),
            pool,
            schema,
        }
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool.get().await.map_err(|e| GatewayError::ConnectionUnavailable {
            tenant: self.tenant.clone(),
            cause: e.to_string(),
        })
    }

    fn query_failed(&self, cause: impl Display) -> GatewayError {
        GatewayError::QueryFailed {
            table: self.schema.name.clone(),
            cause: cause.to_string(),
        }
    }

    fn to_records(&self, rows: Vec<Row>) -> Result<Vec<Record>> {
        rows.iter().map(|row| self.to_record(row)).collect()
    }

    fn to_record(&self, row: &Row) -> Result<Record> {
        let value: Value = row.try_get(0).map_err(|e| self.query_failed(e))?;
        into_record(value, &self.schema.name)
    }

    /// Declared columns present in `record`, excluding the id
    fn written_columns<'a>(&'a self, record: &'a Record) -> Vec<&'a str> {
        self.schema
            .columns()
            .map(|(name, _)| name.as_str())
            .filter(|name| record.contains_key(*name))
            .collect()
    }
}

#[async_trait]
impl ModelHandle for PostgresTable {
    fn table_name(&self) -> &str {
        &self.schema.name
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Record>> {
        let client = self.client().await?;
        let filter = Value::Object(normalize_filter(filter));

        let rows = client
            .query(&sql::select(&self.schema.name), &[&filter])
            .await
            .map_err(|e| self.query_failed(e))?;

        debug!("find on {} returned {} rows", self.schema.name, rows.len());
        self.to_records(rows)
    }

    async fn create(&self, record: Record) -> Result<Record> {
        let record = Value::Object(prepare_insert(&self.schema, record)?);
        let client = self.client().await?;

        let row = client
            .query_one(&sql::insert(&self.schema.name), &[&record])
            .await
            .map_err(|e| self.query_failed(e))?;

        self.to_record(&row)
    }

    async fn create_many(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        let prepared = records
            .into_iter()
            .map(|record| prepare_insert(&self.schema, record).map(Value::Object))
            .collect::<Result<Vec<_>>>()?;

        let mut client = self.client().await?;
        let transaction = client.transaction().await.map_err(|e| self.query_failed(e))?;
        let statement = transaction
            .prepare(&sql::insert(&self.schema.name))
            .await
            .map_err(|e| self.query_failed(e))?;

        let mut created = Vec::with_capacity(prepared.len());
        for record in &prepared {
            let row = transaction
                .query_one(&statement, &[record])
                .await
                .map_err(|e| self.query_failed(e))?;
            created.push(self.to_record(&row)?);
        }

        transaction.commit().await.map_err(|e| self.query_failed(e))?;
        debug!("Inserted {} rows into {}", created.len(), self.schema.name);
        Ok(created)
    }

    async fn update(&self, filter: &Filter, patch: Record) -> Result<Vec<Record>> {
        self.schema.check_patch(&patch)?;

        let columns = self.written_columns(&patch);
        if columns.is_empty() {
            return self.find(filter).await;
        }

        let sql = sql::update(&self.schema.name, &columns);
        let patch = Value::Object(patch);
        let filter = Value::Object(normalize_filter(filter));
        let client = self.client().await?;

        let rows = client
            .query(&sql, &[&filter, &patch])
            .await
            .map_err(|e| self.query_failed(e))?;

        self.to_records(rows)
    }

    async fn replace_or_create(&self, record: Record) -> Result<Record> {
        let record = prepare_insert(&self.schema, record)?;
        let columns: Vec<&str> = self.schema.columns().map(|(name, _)| name.as_str()).collect();
        let sql = sql::upsert(&self.schema.name, &columns);

        let client = self.client().await?;
        let row = client
            .query_one(&sql, &[&Value::Object(record)])
            .await
            .map_err(|e| self.query_failed(e))?;

        self.to_record(&row)
    }

    async fn destroy_by_id(&self, id: &str) -> Result<u64> {
        let client = self.client().await?;
        client
            .execute(&sql::delete_by_id(&self.schema.name), &[&id])
            .await
            .map_err(|e| self.query_failed(e))
    }

    async fn destroy_all(&self, filter: &Filter) -> Result<u64> {
        let client = self.client().await?;
        let filter = Value::Object(normalize_filter(filter));

        let deleted = client
            .execute(&sql::delete_matching(&self.schema.name), &[&filter])
            .await
            .map_err(|e| self.query_failed(e))?;

        debug!("Deleted {} rows from {}", deleted, self.schema.name);
        Ok(deleted)
    }
}
