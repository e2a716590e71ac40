mod record;
mod system;
mod table;

pub use record::{
    filter_by_id, into_record, matches, normalize_filter, prepare_insert, record_id, Filter,
    Record, ID_FIELD,
};
pub use system::{
    is_system_table, physical_for, physical_name, system_schema, ACCOUNT, PROFILE_KEY,
    SYSTEM_TABLES, TASK, TASK_MESSAGES,
};
pub use table::{is_valid_identifier, FieldDef, FieldType, TableSchema};
