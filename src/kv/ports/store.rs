//! Key-value store port consumed by the workflow store services.

use crate::kv::domain::{FieldExpectations, FieldMap, KeyPattern};
use std::sync::Arc;
use thiserror::Error;

/// Result type for key-value store operations.
pub type KeyValueStoreResult<T> = Result<T, KeyValueStoreError>;

/// Record-oriented key-value persistence contract.
///
/// A record is a map of string fields stored under a string key. Every
/// method is atomic with respect to its single key; implementations must not
/// expose partially written records. No method spans several keys, and
/// callers must not rely on cross-key ordering or transactions.
///
/// A record exists only while it holds at least one field.
pub trait KeyValueStore: Send + Sync {
    /// Upserts `fields` into the record at `key`, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend rejects the write.
    fn set_fields(&self, key: &str, fields: &FieldMap) -> KeyValueStoreResult<()>;

    /// Returns every field of the record at `key`.
    ///
    /// Returns an empty map when the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend read fails.
    fn get_all_fields(&self, key: &str) -> KeyValueStoreResult<FieldMap>;

    /// Returns one field of the record at `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend read fails.
    fn get_field(&self, key: &str, field: &str) -> KeyValueStoreResult<Option<String>>;

    /// Returns every stored key matching `pattern`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend scan fails.
    fn list_keys(&self, pattern: &KeyPattern) -> KeyValueStoreResult<Vec<String>>;

    /// Removes the record at `key`.
    ///
    /// Returns `true` when a record existed and was removed.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend delete fails.
    fn delete(&self, key: &str) -> KeyValueStoreResult<bool>;

    /// Creates the record at `key` with `fields` only if no record exists.
    ///
    /// Returns `false`, leaving the existing record untouched, when the key is
    /// already present.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend write fails.
    fn set_fields_if_absent(&self, key: &str, fields: &FieldMap) -> KeyValueStoreResult<bool>;

    /// Applies `updates` to the record at `key` only if every entry in
    /// `expected` matches the record's current field value.
    ///
    /// An expectation of `None` requires the field to be absent. Returns
    /// `false` without writing when the record does not exist or any
    /// expectation fails.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError`] when the backend write fails.
    fn compare_and_set_fields(
        &self,
        key: &str,
        expected: &FieldExpectations,
        updates: &FieldMap,
    ) -> KeyValueStoreResult<bool>;
}

/// Errors returned by key-value store implementations.
#[derive(Debug, Clone, Error)]
pub enum KeyValueStoreError {
    /// A lock guarding in-process state was poisoned by a panicking writer.
    #[error("key-value state lock poisoned: {0}")]
    Poisoned(String),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl KeyValueStoreError {
    /// Wraps a persistence-layer failure.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}

/// Returns whether `fields` satisfies every expectation.
///
/// Shared by adapters so conditional writes agree on absent-field semantics.
#[must_use]
pub fn expectations_hold(fields: &FieldMap, expected: &FieldExpectations) -> bool {
    expected
        .iter()
        .all(|(field, value)| fields.get(field) == value.as_ref())
}
