//! Idempotent materialization of tasks.

use super::{EntityStore, StoreError, StoreResult, records};
use crate::kv::{domain::FieldMap, ports::KeyValueStore};
use crate::workflow::{
    domain::{NewTask, TaskId},
    keys::{ParsedKey, TaskKeyFilter},
    serializer,
};
use mockable::Clock;
use serde_json::Value;
use tracing::debug;

/// Find-or-create service for tasks.
///
/// A task is created at most once per identity and normalized payload,
/// including when several workers request it concurrently. The first
/// creator wins a set-if-absent claim on the identity; everyone else adopts
/// the claimed identifier.
pub struct DeduplicationResolver<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    entities: EntityStore<S, C>,
}

impl<S, C> Clone for DeduplicationResolver<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            entities: self.entities.clone(),
        }
    }
}

impl<S, C> DeduplicationResolver<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a resolver over `entities`.
    #[must_use]
    pub const fn new(entities: EntityStore<S, C>) -> Self {
        Self { entities }
    }

    /// Returns the identifier of the task matching `request`, creating the
    /// task when none exists.
    ///
    /// An existing match is returned without writing anything. A request
    /// that differs only in payload creates a separate task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when the name or queue contains the
    /// key separator, [`StoreError::CorruptRecord`] when a candidate's stored
    /// payload is missing or cannot be decoded, or a backend error.
    pub fn find_or_persist_task(&self, request: NewTask) -> StoreResult<TaskId> {
        if let Some(existing) = self.find_existing(&request)? {
            debug!(task_id = %existing, name = %request.name(), "reusing existing task");
            return Ok(existing);
        }

        let digest = serializer::payload_digest(request.payload())?;
        let claim_key = self.entities.keys().task_identity_claim_key(
            request.name(),
            request.queue_name(),
            request.job_id(),
            request.parent_task_id(),
            &digest,
        )?;
        let fresh = TaskId::new();
        let claim = FieldMap::from([(records::TASK_ID.to_owned(), fresh.to_string())]);

        if self.entities.store().set_fields_if_absent(&claim_key, &claim)? {
            let task = request.into_task(fresh);
            self.entities.write_new_task(&task)?;
            debug!(task_id = %fresh, name = %task.name(), job_id = %task.job_id(), "materialized task");
            return Ok(fresh);
        }

        let claimed = self.claimed_task_id(&claim_key)?;
        if self.entities.task_key_for(claimed)?.is_none() {
            // The winning creator has not written its record yet. The record
            // is fully determined by the identity, so writing it is idempotent.
            self.entities.write_new_task(&request.into_task(claimed))?;
        }
        debug!(task_id = %claimed, claim_key = %claim_key, "adopted concurrently created task");
        Ok(claimed)
    }

    fn find_existing(&self, request: &NewTask) -> StoreResult<Option<TaskId>> {
        let keys = self.entities.keys();
        let pattern = keys.task_pattern(&TaskKeyFilter {
            name: Some(request.name()),
            queue_name: Some(request.queue_name()),
            job_id: Some(request.job_id()),
            parent: request.parent_task_id().into(),
            id: None,
        })?;

        for key in self.entities.sorted_keys(&pattern)? {
            let fields = self.entities.store().get_all_fields(&key)?;
            if fields.is_empty() {
                // Deleted after the scan.
                continue;
            }
            let raw = records::required(&key, &fields, records::PAYLOAD)?;
            let stored: Value = records::json(&key, records::PAYLOAD, raw)?;
            if !serializer::payloads_equivalent(&stored, request.payload()) {
                continue;
            }
            if let ParsedKey::Task(parts) = keys.parse(&key)? {
                return Ok(Some(parts.id));
            }
        }
        Ok(None)
    }

    fn claimed_task_id(&self, claim_key: &str) -> StoreResult<TaskId> {
        let raw = self
            .entities
            .store()
            .get_field(claim_key, records::TASK_ID)?
            .ok_or_else(|| StoreError::corrupt(claim_key, "task_id: field is missing"))?;
        records::parsed(claim_key, records::TASK_ID, &raw)
    }
}
