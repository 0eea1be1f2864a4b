//! Port contract for key-value persistence.

pub mod store;

pub use store::{KeyValueStore, KeyValueStoreError, KeyValueStoreResult, expectations_hold};
