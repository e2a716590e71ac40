//! SQL text for the relational engine
//!
//! Rows cross the wire as JSONB: reads use `to_jsonb(t)`, writes go through
//! `jsonb_populate_record` against the table's own row type, and equality
//! filters are JSONB containment (`@>`). Every identifier is quoted.

use crate::schema::{FieldType, TableSchema, ID_FIELD};

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn column_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "TEXT",
        FieldType::Number => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Date => "TIMESTAMPTZ",
        FieldType::Object | FieldType::Array | FieldType::Any => "JSONB",
    }
}

pub fn create_table(schema: &TableSchema) -> String {
    let mut columns = vec![format!("{} TEXT PRIMARY KEY", quote_ident(ID_FIELD))];

    for (name, def) in schema.columns() {
        let mut column = format!("{} {}", quote_ident(name), column_type(def.field_type));
        if def.required {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        quote_ident(&schema.name),
        columns.join(",\n    ")
    )
}

pub fn select(table: &str) -> String {
    format!(
        "SELECT to_jsonb(t) FROM {} AS t WHERE to_jsonb(t) @> $1::jsonb",
        quote_ident(table)
    )
}

pub fn insert(table: &str) -> String {
    let table = quote_ident(table);
    format!(
        "INSERT INTO {table} AS t SELECT * FROM jsonb_populate_record(NULL::{table}, $1::jsonb) RETURNING to_jsonb(t.*)"
    )
}

/// `$1` is the filter, `$2` the patch; only `columns` are written.
pub fn update(table: &str, columns: &[&str]) -> String {
    let table = quote_ident(table);
    let assignments = columns
        .iter()
        .map(|c| format!("{col} = r.{col}", col = quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "UPDATE {table} AS t SET {assignments} FROM jsonb_populate_record(NULL::{table}, $2::jsonb) AS r WHERE to_jsonb(t) @> $1::jsonb RETURNING to_jsonb(t.*)"
    )
}

pub fn upsert(table: &str, columns: &[&str]) -> String {
    let table = quote_ident(table);
    let id = quote_ident(ID_FIELD);

    let assignments = if columns.is_empty() {
        format!("{id} = EXCLUDED.{id}")
    } else {
        columns
            .iter()
            .map(|c| format!("{col} = EXCLUDED.{col}", col = quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "INSERT INTO {table} AS t SELECT * FROM jsonb_populate_record(NULL::{table}, $1::jsonb) ON CONFLICT ({id}) DO UPDATE SET {assignments} RETURNING to_jsonb(t.*)"
    )
}

pub fn delete_by_id(table: &str) -> String {
    format!("DELETE FROM {} WHERE {} = $1", quote_ident(table), quote_ident(ID_FIELD))
}

pub fn delete_matching(table: &str) -> String {
    format!(
        "DELETE FROM {} AS t WHERE to_jsonb(t) @> $1::jsonb",
        quote_ident(table)
    )
}
