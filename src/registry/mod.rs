//! Storage and Model Registries
//!
//! Storage descriptors, materialized models and tenant datasources are kept
//! in memory and mirrored to JSON documents in the gateway's data directory.
//!
//! Directory structure:
//! ```text
//! {data_dir}/
//!   ├── storages.json       # storage id -> descriptor
//!   ├── datasources.json    # tenant key -> connection parameters
//!   └── model-config.json   # tenant key/physical table -> model definition
//! ```
//!
//! `model-config.json` is keyed by `<tenantKey>/<physical table>` rather than
//! the bare physical name: two tenants may both own a user table called
//! `orders`, and a bare key would let one overwrite the other. Readers that
//! expect physical-name keys must strip the tenant prefix (see [`model_key`]).

mod document;
mod metadata;
mod models;
mod storage;

pub use document::JsonDocument;
pub use metadata::{model_key, MetadataStore, ModelRecord, DATASOURCES_FILE, MODEL_CONFIG_FILE, STORAGES_FILE};
pub use models::{ModelEntry, ModelRegistry, RestoreReport};
pub use storage::{NewStorage, StorageDescriptor, StorageStore};
