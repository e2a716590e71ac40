use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionState {
    Connecting,
    MaterializingUserTables,
    MaterializingSystemTables,
    Done,
    /// The tenant connection could not be established; no table was attempted.
    Aborted,
}

impl ProvisionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisionState::Done | ProvisionState::Aborted)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProvisionState::Connecting => "connecting",
            ProvisionState::MaterializingUserTables => "materializing_user_tables",
            ProvisionState::MaterializingSystemTables => "materializing_system_tables",
            ProvisionState::Done => "done",
            ProvisionState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    Materialized,
    Failed { cause: String },
}

/// Emitted once per table as soon as its materialization settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEvent {
    pub logical: String,
    pub physical: String,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

impl TableEvent {
    pub fn is_ok(&self) -> bool {
        self.outcome == TableOutcome::Materialized
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionReport {
    pub storage_id: String,
    pub tenant: String,
    pub tables: Vec<TableEvent>,
}

impl ProvisionReport {
    pub fn new(storage_id: &str, tenant: &str) -> Self {
        Self {
            storage_id: storage_id.to_string(),
            tenant: tenant.to_string(),
            tables: Vec::new(),
        }
    }

    pub fn materialized(&self) -> impl Iterator<Item = &TableEvent> {
        self.tables.iter().filter(|t| t.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &TableEvent> {
        self.tables.iter().filter(|t| !t.is_ok())
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn event(&self, physical: &str) -> Option<&TableEvent> {
        self.tables.iter().find(|t| t.physical == physical)
    }
}
