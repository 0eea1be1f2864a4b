//! Assembly of the workflow store services over one backing store.

use super::{DeduplicationResolver, EntityStore, LeaseManager, StoreResult};
use crate::config::StoreConfig;
use crate::kv::{adapters, ports::KeyValueStore};
use crate::workflow::keys::KeyIndex;
use mockable::Clock;
use std::sync::Arc;

/// Entity, deduplication and lease services sharing one store, clock and
/// namespace.
pub struct WorkflowStore<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    entities: EntityStore<S, C>,
    deduplication: DeduplicationResolver<S, C>,
    leases: LeaseManager<S, C>,
}

impl<S, C> Clone for WorkflowStore<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            entities: self.entities.clone(),
            deduplication: self.deduplication.clone(),
            leases: self.leases.clone(),
        }
    }
}

impl<S, C> WorkflowStore<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Wires the services over `store` using the namespace in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Config`] when `config` is invalid.
    pub fn new(store: Arc<S>, clock: Arc<C>, config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let keys = KeyIndex::new(config.namespace.as_str())?;
        let entities = EntityStore::new(store, clock, keys);
        Ok(Self {
            deduplication: DeduplicationResolver::new(entities.clone()),
            leases: LeaseManager::new(entities.clone()),
            entities,
        })
    }

    /// Returns the entity CRUD service.
    #[must_use]
    pub const fn entities(&self) -> &EntityStore<S, C> {
        &self.entities
    }

    /// Returns the task find-or-create service.
    #[must_use]
    pub const fn deduplication(&self) -> &DeduplicationResolver<S, C> {
        &self.deduplication
    }

    /// Returns the task lease service.
    #[must_use]
    pub const fn leases(&self) -> &LeaseManager<S, C> {
        &self.leases
    }
}

impl<C> WorkflowStore<dyn KeyValueStore, C>
where
    C: Clock + Send + Sync,
{
    /// Opens the backend selected by `config` and wires the services over it.
    ///
    /// # Errors
    ///
    /// Returns [`super::StoreError::Config`] when `config` is invalid, or
    /// [`super::StoreError::Backend`] when the backend cannot be opened.
    pub fn open(config: &StoreConfig, clock: Arc<C>) -> StoreResult<Self> {
        config.validate()?;
        let store = adapters::connect(&config.backend)?;
        Self::new(store, clock, config)
    }
}
