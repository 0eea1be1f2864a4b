//! Adapter implementations for the key-value port.

pub mod memory;
pub mod postgres;

use crate::config::BackendConfig;
use crate::kv::ports::{KeyValueStore, KeyValueStoreResult};
use std::sync::Arc;

/// Opens the key-value store selected by `backend`.
///
/// # Errors
///
/// Returns [`crate::kv::ports::KeyValueStoreError::Persistence`] when the
/// `PostgreSQL` pool cannot be built.
pub fn connect(backend: &BackendConfig) -> KeyValueStoreResult<Arc<dyn KeyValueStore>> {
    match backend {
        BackendConfig::Memory => Ok(Arc::new(memory::InMemoryKeyValueStore::new())),
        BackendConfig::Postgres(config) => Ok(Arc::new(postgres::PostgresKeyValueStore::connect(
            config,
        )?)),
    }
}
