//! System tables
//!
//! Every tenant gets an `account` and a `task` table regardless of its own
//! structure. Their definitions are static per engine and their physical
//! names carry the tenant's table prefix.

use crate::engine::EngineType;
use crate::error::{GatewayError, Result};
use crate::schema::table::TableSchema;

pub const ACCOUNT: &str = "account";
pub const TASK: &str = "task";

pub const SYSTEM_TABLES: [&str; 2] = [ACCOUNT, TASK];

/// Field on accounts that correlates them with their tasks
pub const PROFILE_KEY: &str = "profileKey";
pub const TASK_MESSAGES: &str = "taskMessages";

pub fn is_system_table(logical: &str) -> bool {
    SYSTEM_TABLES.contains(&logical)
}

pub fn physical_name(prefix: &str, logical: &str) -> String {
    format!("{}_{}", prefix, logical)
}

/// Resolve a logical name to the physical name it is stored under.
pub fn physical_for(prefix: &str, logical: &str) -> String {
    if is_system_table(logical) {
        physical_name(prefix, logical)
    } else {
        logical.to_string()
    }
}

fn definition(engine: EngineType, logical: &str) -> Option<&'static str> {
    match (engine, logical) {
        (EngineType::Postgresql, ACCOUNT) => Some(include_str!("definitions/postgresql/account.json")),
        (EngineType::Postgresql, TASK) => Some(include_str!("definitions/postgresql/task.json")),
        (EngineType::Memory, ACCOUNT) => Some(include_str!("definitions/memory/account.json")),
        (EngineType::Memory, TASK) => Some(include_str!("definitions/memory/task.json")),
        _ => None,
    }
}

/// Load the engine's definition of a system table (under its logical name).
pub fn system_schema(engine: EngineType, logical: &str) -> Result<TableSchema> {
    let raw = definition(engine, logical).ok_or_else(|| GatewayError::Internal(format!(
        "No system table '{}' defined for engine {}",
        logical, engine
    )))?;

    serde_json::from_str(raw).map_err(|e| GatewayError::Internal(
        format!("Failed to parse {} definition for {}: {}", logical, engine, e)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_schemas_load_for_every_engine() {
        for engine in [EngineType::Postgresql, EngineType::Memory] {
            for logical in SYSTEM_TABLES {
                let schema = system_schema(engine, logical).unwrap();
                assert_eq!(schema.name, logical);
                assert!(schema.structure[PROFILE_KEY].required);
                schema.validate().unwrap();
            }
        }
    }

    #[test]
    fn test_task_has_messages_field() {
        let task = system_schema(EngineType::Postgresql, TASK).unwrap();
        assert!(task.structure.contains_key(TASK_MESSAGES));
    }

    #[test]
    fn test_physical_names() {
        assert_eq!(physical_for("acme", "account"), "acme_account");
        assert_eq!(physical_for("acme", "task"), "acme_task");
        assert_eq!(physical_for("acme", "widgets"), "widgets");
    }
}
