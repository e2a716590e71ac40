//! Connection Registry
//!
//! Maps a [`TenantKey`] to one live connection for the lifetime of the
//! process. Connections are dialed lazily, at most once per key.

mod params;
mod registry;

pub use params::{ConnectionParams, TenantKey};
pub use registry::{Connection, ConnectionRegistry};
