//! `PostgreSQL` adapter for the key-value port.
//!
//! Records are stored one row per field in `kv_records`. Every write takes a
//! transaction-scoped advisory lock on the record key, so conditional writes
//! observe and modify a record as one step even across connections.

mod models;
mod schema;
mod store;

pub use store::{KvPgPool, PostgresKeyValueStore};
