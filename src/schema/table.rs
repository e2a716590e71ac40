//! Table schema definitions
//!
//! A table schema is the data-driven description a tenant submits for each
//! table in its `dbStructure`. Field types are a closed set of tagged
//! variants; each engine maps them onto its own physical types.
//!
//! Fields accept either the full form or the shorthand:
//!
//! ```json
//! { "title": { "type": "string", "required": true },
//!   "score": "number" }
//! ```

use crate::error::{GatewayError, Result};
use crate::schema::record::{Record, ID_FIELD};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Object,
    Array,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "FieldDefRepr")]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FieldDefRepr {
    Short(FieldType),
    Full {
        #[serde(rename = "type")]
        field_type: FieldType,
        #[serde(default)]
        required: bool,
        #[serde(default)]
        default: Option<Value>,
    },
}

impl From<FieldDefRepr> for FieldDef {
    fn from(repr: FieldDefRepr) -> Self {
        match repr {
            FieldDefRepr::Short(field_type) => FieldDef::new(field_type),
            FieldDefRepr::Full {
                field_type,
                required,
                default,
            } => FieldDef {
                field_type,
                required,
                default,
            },
        }
    }
}

impl FieldDef {
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// One table of a tenant's structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    #[serde(default, alias = "properties")]
    pub structure: BTreeMap<String, FieldDef>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structure: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.structure.insert(name.into(), def);
        self
    }

    /// Same structure under a different (physical) name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            structure: self.structure.clone(),
        }
    }

    /// Declared fields other than the implicit `id`, in stable order.
    pub fn columns(&self) -> impl Iterator<Item = (&String, &FieldDef)> {
        self.structure.iter().filter(|(name, _)| name.as_str() != ID_FIELD)
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.name) {
            return Err(GatewayError::InvalidRequest {
                message: format!(
                    "Invalid table name: '{}'. Must start with a letter or underscore and contain only alphanumerics and underscores.",
                    self.name
                ),
            });
        }

        for field in self.structure.keys() {
            if !is_valid_identifier(field) {
                return Err(GatewayError::InvalidRequest {
                    message: format!("Invalid field name '{}' in table '{}'", field, self.name),
                });
            }
        }

        Ok(())
    }

    /// SHA-256 over the canonical JSON of the structure
    pub fn checksum(&self) -> String {
        let canonical = serde_json::to_vec(&self.structure).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }

    pub fn apply_defaults(&self, record: &mut Record) {
        for (name, def) in self.columns() {
            if let Some(default) = &def.default {
                let missing = record.get(name).map(Value::is_null).unwrap_or(true);
                if missing {
                    record.insert(name.clone(), default.clone());
                }
            }
        }
    }

    /// Required fields must be present and non-null in a full record.
    pub fn check_required(&self, record: &Record) -> Result<()> {
        for (name, def) in self.columns() {
            if def.required && record.get(name).map(Value::is_null).unwrap_or(true) {
                return Err(GatewayError::InvalidRequest {
                    message: format!("Field '{}' is required in '{}'", name, self.name),
                });
            }
        }
        Ok(())
    }

    /// In a partial update only fields being written are checked.
    pub fn check_patch(&self, patch: &Record) -> Result<()> {
        for (name, def) in self.columns() {
            if def.required && matches!(patch.get(name), Some(Value::Null)) {
                return Err(GatewayError::InvalidRequest {
                    message: format!("Field '{}' in '{}' cannot be null", name, self.name),
                });
            }
        }
        Ok(())
    }
}

pub fn is_valid_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}
