//! TenantDB Gateway Library
//!
//! Provisions one database per tenant from a storage descriptor, keeps a
//! registry of the resulting table models, and serves tenant-scoped CRUD
//! over them.

pub mod api;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod ops;
pub mod provision;
pub mod registry;
pub mod schema;
