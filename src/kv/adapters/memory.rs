//! In-memory key-value store for tests and single-process deployments.

use crate::kv::{
    domain::{FieldExpectations, FieldMap, KeyPattern},
    ports::{KeyValueStore, KeyValueStoreError, KeyValueStoreResult, expectations_hold},
};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe in-memory key-value store.
///
/// Clones share the same underlying records, so one instance can be handed
/// to several services or threads.
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    state: Arc<RwLock<InMemoryKeyValueState>>,
}

#[derive(Debug, Default)]
struct InMemoryKeyValueState {
    records: BTreeMap<String, FieldMap>,
}

impl InMemoryKeyValueStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError::Poisoned`] when the state lock is
    /// poisoned.
    pub fn len(&self) -> KeyValueStoreResult<usize> {
        Ok(self.read()?.records.len())
    }

    /// Returns true when no records are stored.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError::Poisoned`] when the state lock is
    /// poisoned.
    pub fn is_empty(&self) -> KeyValueStoreResult<bool> {
        Ok(self.read()?.records.is_empty())
    }

    fn read(&self) -> KeyValueStoreResult<RwLockReadGuard<'_, InMemoryKeyValueState>> {
        self.state
            .read()
            .map_err(|err| KeyValueStoreError::Poisoned(err.to_string()))
    }

    fn write(&self) -> KeyValueStoreResult<RwLockWriteGuard<'_, InMemoryKeyValueState>> {
        self.state
            .write()
            .map_err(|err| KeyValueStoreError::Poisoned(err.to_string()))
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn set_fields(&self, key: &str, fields: &FieldMap) -> KeyValueStoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut state = self.write()?;
        let record = state.records.entry(key.to_owned()).or_default();
        record.extend(fields.iter().map(|(field, value)| (field.clone(), value.clone())));
        Ok(())
    }

    fn get_all_fields(&self, key: &str) -> KeyValueStoreResult<FieldMap> {
        let state = self.read()?;
        Ok(state.records.get(key).cloned().unwrap_or_default())
    }

    fn get_field(&self, key: &str, field: &str) -> KeyValueStoreResult<Option<String>> {
        let state = self.read()?;
        Ok(state
            .records
            .get(key)
            .and_then(|record| record.get(field))
            .cloned())
    }

    fn list_keys(&self, pattern: &KeyPattern) -> KeyValueStoreResult<Vec<String>> {
        let state = self.read()?;
        let prefix = pattern.literal_prefix();
        Ok(state
            .records
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| pattern.matches(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn delete(&self, key: &str) -> KeyValueStoreResult<bool> {
        let mut state = self.write()?;
        Ok(state.records.remove(key).is_some())
    }

    fn set_fields_if_absent(&self, key: &str, fields: &FieldMap) -> KeyValueStoreResult<bool> {
        let mut state = self.write()?;
        if state.records.contains_key(key) {
            return Ok(false);
        }
        state.records.insert(key.to_owned(), fields.clone());
        Ok(true)
    }

    fn compare_and_set_fields(
        &self,
        key: &str,
        expected: &FieldExpectations,
        updates: &FieldMap,
    ) -> KeyValueStoreResult<bool> {
        let mut state = self.write()?;
        let Some(record) = state.records.get_mut(key) else {
            return Ok(false);
        };
        if !expectations_hold(record, expected) {
            return Ok(false);
        }
        record.extend(updates.iter().map(|(field, value)| (field.clone(), value.clone())));
        Ok(true)
    }
}
