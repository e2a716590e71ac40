//! In-process document engine
//!
//! Databases are named sets of collections held in memory for the lifetime
//! of the engine. Documents are schemaless beyond the declared defaults and
//! required fields, so extra fields are kept as submitted.

use crate::connection::ConnectionParams;
use crate::engine::{Datasource, Engine, EngineType, ModelHandle};
use crate::error::{GatewayError, Result};
use crate::schema::{
    matches, normalize_filter, prepare_insert, record_id, Filter, Record, TableSchema, ID_FIELD,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Default)]
pub struct MemoryEngine {
    databases: DashMap<String, Arc<MemoryDatabase>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases.get(name).map(|db| db.clone())
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Memory
    }

    async fn connect(&self, params: &ConnectionParams) -> Result<Arc<dyn Datasource>> {
        let database = if params.create_database {
            self.databases
                .entry(params.database.clone())
                .or_insert_with(|| {
                    info!("Created in-memory database: {}", params.database);
                    Arc::new(MemoryDatabase::default())
                })
                .clone()
        } else {
            self.database(&params.database).ok_or_else(|| GatewayError::ConnectionFailed {
                tenant: params.name.clone(),
                cause: format!("database '{}' does not exist", params.database),
            })?
        };

        Ok(Arc::new(MemoryDatasource {
            name: params.name.clone(),
            database,
        }))
    }
}

#[derive(Default)]
pub struct MemoryDatabase {
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl MemoryDatabase {
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    fn collection(&self, schema: &TableSchema) -> (Arc<MemoryCollection>, bool) {
        let mut created = false;
        let collection = self
            .collections
            .entry(schema.name.clone())
            .or_insert_with(|| {
                created = true;
                Arc::new(MemoryCollection::default())
            })
            .clone();
        (collection, created)
    }
}

#[derive(Default)]
pub struct MemoryCollection {
    documents: RwLock<Vec<Record>>,
}

struct MemoryDatasource {
    name: String,
    database: Arc<MemoryDatabase>,
}

#[async_trait]
impl Datasource for MemoryDatasource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn materialize(&self, schema: &TableSchema) -> Result<Arc<dyn ModelHandle>> {
        schema.validate()?;

        let (collection, created) = self.database.collection(schema);
        if created {
            info!("Created collection {} in {}", schema.name, self.name);
        } else {
            debug!("Collection {} already exists in {}", schema.name, self.name);
        }

        Ok(Arc::new(MemoryTable {
            schema: schema.clone(),
            collection,
        }))
    }

    fn attach(&self, schema: &TableSchema) -> Result<Arc<dyn ModelHandle>> {
        let (collection, _) = self.database.collection(schema);
        Ok(Arc::new(MemoryTable {
            schema: schema.clone(),
            collection,
        }))
    }
}

struct MemoryTable {
    schema: TableSchema,
    collection: Arc<MemoryCollection>,
}

#[async_trait]
impl ModelHandle for MemoryTable {
    fn table_name(&self) -> &str {
        &self.schema.name
    }

    async fn find(&self, filter: &Filter) -> Result<Vec<Record>> {
        let filter = normalize_filter(filter);
        let documents = self.collection.documents.read().await;
        Ok(documents
            .iter()
            .filter(|doc| matches(doc, &filter))
            .cloned()
            .collect())
    }

    async fn create(&self, record: Record) -> Result<Record> {
        let record = prepare_insert(&self.schema, record)?;
        let id = record_id(&record).unwrap_or_default();

        let mut documents = self.collection.documents.write().await;
        if documents.iter().any(|doc| record_id(doc).as_deref() == Some(id.as_str())) {
            return Err(GatewayError::QueryFailed {
                table: self.schema.name.clone(),
                cause: format!("duplicate id '{}'", id),
            });
        }

        documents.push(record.clone());
        Ok(record)
    }

    async fn update(&self, filter: &Filter, mut patch: Record) -> Result<Vec<Record>> {
        self.schema.check_patch(&patch)?;
        patch.remove(ID_FIELD);

        let filter = normalize_filter(filter);
        let mut documents = self.collection.documents.write().await;
        let mut updated = Vec::new();

        for doc in documents.iter_mut().filter(|doc| matches(doc, &filter)) {
            for (key, value) in &patch {
                doc.insert(key.clone(), value.clone());
            }
            updated.push(doc.clone());
        }

        Ok(updated)
    }

    async fn replace_or_create(&self, record: Record) -> Result<Record> {
        let record = prepare_insert(&self.schema, record)?;
        let id = record_id(&record);

        let mut documents = self.collection.documents.write().await;
        match documents.iter_mut().find(|doc| record_id(doc) == id) {
            Some(existing) => *existing = record.clone(),
            None => documents.push(record.clone()),
        }

        Ok(record)
    }

    async fn destroy_by_id(&self, id: &str) -> Result<u64> {
        let mut documents = self.collection.documents.write().await;
        let before = documents.len();
        documents.retain(|doc| record_id(doc).as_deref() != Some(id));
        Ok((before - documents.len()) as u64)
    }

    async fn destroy_all(&self, filter: &Filter) -> Result<u64> {
        let filter = normalize_filter(filter);
        let mut documents = self.collection.documents.write().await;
        let before = documents.len();
        documents.retain(|doc| !matches(doc, &filter));
        Ok((before - documents.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDef, FieldType};
    use serde_json::{json, Value};

    impl MemoryTable {
        async fn len(&self) -> usize {
            self.collection.documents.read().await.len()
        }
    }

    fn params(database: &str) -> ConnectionParams {
        ConnectionParams {
            name: format!("memory:{}", database),
            connector: EngineType::Memory,
            host: "localhost".to_string(),
            port: 0,
            database: database.to_string(),
            username: String::new(),
            password: String::new(),
            create_database: true,
        }
    }

    fn notes() -> TableSchema {
        TableSchema::new("notes")
            .field("body", FieldDef::new(FieldType::String).required())
            .field("pinned", FieldDef::new(FieldType::Boolean).with_default(json!(false)))
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent() {
        let engine = MemoryEngine::new();
        let datasource = engine.connect(&params("shop")).await.unwrap();

        let first = datasource.materialize(&notes()).await.unwrap();
        first.create(record(json!({"body": "hello"}))).await.unwrap();

        let second = datasource.materialize(&notes()).await.unwrap();
        assert_eq!(second.find(&Filter::new()).await.unwrap().len(), 1);
        assert_eq!(engine.database("shop").unwrap().collection_names(), vec!["notes"]);
    }

    #[tokio::test]
    async fn test_connect_without_create_requires_database() {
        let engine = MemoryEngine::new();
        let mut p = params("ghost");
        p.create_database = false;
        assert!(matches!(
            engine.connect(&p).await,
            Err(GatewayError::ConnectionFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_crud_round() {
        let engine = MemoryEngine::new();
        let datasource = engine.connect(&params("crm")).await.unwrap();
        let table = datasource.materialize(&notes()).await.unwrap();

        let created = table.create(record(json!({"id": "n1", "body": "a"}))).await.unwrap();
        assert_eq!(created["pinned"], json!(false));
        assert!(table.create(record(json!({"id": "n1", "body": "dup"}))).await.is_err());
        assert!(table.create(record(json!({"pinned": true}))).await.is_err());

        let updated = table
            .update(&record(json!({"id": "n1"})), record(json!({"pinned": true, "tag": "x"})))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["body"], json!("a"));
        assert_eq!(updated[0]["tag"], json!("x"));

        let replaced = table
            .replace_or_create(record(json!({"id": "n1", "body": "b"})))
            .await
            .unwrap();
        assert_eq!(replaced["pinned"], json!(false));
        assert!(replaced.get("tag").is_none());

        table.replace_or_create(record(json!({"body": "c"}))).await.unwrap();
        assert_eq!(table.find(&Filter::new()).await.unwrap().len(), 2);

        assert_eq!(table.destroy_by_id("n1").await.unwrap(), 1);
        assert_eq!(table.destroy_all(&Filter::new()).await.unwrap(), 1);
        assert!(table.find(&Filter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_numeric_id() {
        let engine = MemoryEngine::new();
        let datasource = engine.connect(&params("ids")).await.unwrap();
        let table = datasource.materialize(&notes()).await.unwrap();

        table.create(record(json!({"id": 5, "body": "five"}))).await.unwrap();
        let found = table.find(&record(json!({"id": 5}))).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(table.find_by_id("5").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_attach_sees_existing_documents() {
        let engine = MemoryEngine::new();
        let datasource = engine.connect(&params("attach")).await.unwrap();
        datasource
            .materialize(&notes())
            .await
            .unwrap()
            .create(record(json!({"body": "kept"})))
            .await
            .unwrap();

        let attached = MemoryTable {
            schema: notes(),
            collection: engine.database("attach").unwrap().collection(&notes()).0,
        };
        assert_eq!(attached.len().await, 1);
    }
}
