//! Records and equality filters shared by every engine.

use crate::error::{GatewayError, Result};
use crate::schema::table::TableSchema;
use serde_json::Value;
use uuid::Uuid;

pub const ID_FIELD: &str = "id";

pub type Record = serde_json::Map<String, Value>;

/// Top-level equality match; an empty filter matches every record.
pub type Filter = serde_json::Map<String, Value>;

pub fn filter_by_id(id: &str) -> Filter {
    let mut filter = Filter::new();
    filter.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    filter
}

/// The record's id as a string, if it carries a usable one.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get(ID_FIELD) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Ids are stored as text, so numeric ids in filters are compared as strings.
pub fn normalize_filter(filter: &Filter) -> Filter {
    let mut normalized = filter.clone();
    if let Some(Value::Number(n)) = filter.get(ID_FIELD) {
        normalized.insert(ID_FIELD.to_string(), Value::String(n.to_string()));
    }
    normalized
}

pub fn matches(record: &Record, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| record.get(key).unwrap_or(&Value::Null) == expected)
}

/// Prepare a full record for insertion: id, defaults, required fields.
pub fn prepare_insert(schema: &TableSchema, mut record: Record) -> Result<Record> {
    let id = record_id(&record).unwrap_or_else(|| Uuid::new_v4().to_string());
    record.insert(ID_FIELD.to_string(), Value::String(id));

    schema.apply_defaults(&mut record);
    schema.check_required(&record)?;

    Ok(record)
}

pub fn into_record(value: Value, table: &str) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(GatewayError::QueryFailed {
            table: table.to_string(),
            cause: format!("expected a JSON object row, got {}", other),
        }),
    }
}
