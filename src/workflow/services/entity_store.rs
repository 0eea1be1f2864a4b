//! CRUD over workflows, jobs and tasks in the flat key namespace.

use super::{StoreError, StoreResult, records};
use crate::kv::{
    domain::{FieldExpectations, FieldMap, KeyPattern},
    ports::KeyValueStore,
};
use crate::workflow::{
    domain::{Job, JobId, SortOrder, Task, TaskId, Workflow, WorkflowId},
    keys::{KeyError, KeyIndex, ParentFilter, ParsedKey, TaskKeyFilter, TaskKeyParts},
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Age after which a workflow name claim with no record behind it is
/// considered abandoned by a crashed creator.
pub const STALE_CLAIM_AGE: TimeDelta = TimeDelta::seconds(60);

/// Entity persistence service.
///
/// Lookups by secondary attribute scan the keys matching a pattern, so
/// their cost grows with the number of matching records.
pub struct EntityStore<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    keys: KeyIndex,
}

impl<S, C> Clone for EntityStore<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            keys: self.keys.clone(),
        }
    }
}

impl<S, C> EntityStore<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates an entity store over `store`.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>, keys: KeyIndex) -> Self {
        Self { store, clock, keys }
    }

    /// Returns the key index used by this store.
    #[must_use]
    pub const fn keys(&self) -> &KeyIndex {
        &self.keys
    }

    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    /// Persists a new workflow.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateName`] when a workflow with `name`
    /// exists, [`StoreError::InvalidKey`] when `name` contains the key
    /// separator, or a backend error.
    pub fn persist_workflow(&self, name: &str, descriptor: Value) -> StoreResult<Workflow> {
        if self.find_workflow_by_name(name)?.is_some() {
            return Err(StoreError::DuplicateName(name.to_owned()));
        }

        let workflow = Workflow::new(name, descriptor);
        let claim_key = self.keys.workflow_name_claim_key(name)?;
        let claim = self.name_claim(workflow.id());
        let claimed = self.store.set_fields_if_absent(&claim_key, &claim)?
            || self.take_over_stale_claim(name, &claim_key, &claim)?;
        if !claimed {
            return Err(StoreError::DuplicateName(name.to_owned()));
        }

        if let Err(err) = self.write_workflow(&workflow) {
            // A leftover claim would block the name until it goes stale.
            if let Err(release) = self.release_name_claim(name, workflow.id()) {
                warn!(name = %name, error = %release, "failed to release workflow name claim");
            }
            return Err(err);
        }
        debug!(workflow_id = %workflow.id(), name = %name, "persisted workflow");
        Ok(workflow)
    }

    /// Finds a workflow by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRecord`] when the stored record is
    /// malformed, or a backend error.
    pub fn find_workflow(&self, id: WorkflowId) -> StoreResult<Option<Workflow>> {
        self.first_workflow(&self.keys.workflow_pattern(None, Some(id))?)
    }

    /// Finds a workflow by its unique name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRecord`] when the stored record is
    /// malformed, [`StoreError::InvalidKey`] when `name` contains the key
    /// separator, or a backend error.
    pub fn find_workflow_by_name(&self, name: &str) -> StoreResult<Option<Workflow>> {
        self.first_workflow(&self.keys.workflow_pattern(Some(name), None)?)
    }

    /// Deletes a workflow by identifier and releases its name.
    ///
    /// Returns `true` when a record existed and was removed. Jobs created
    /// from the workflow keep their snapshot.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the store fails.
    pub fn delete_workflow(&self, id: WorkflowId) -> StoreResult<bool> {
        let pattern = self.keys.workflow_pattern(None, Some(id))?;
        self.delete_workflows(&pattern)
    }

    /// Deletes a workflow by name and releases the name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when `name` contains the key
    /// separator, or a backend error.
    pub fn delete_workflow_by_name(&self, name: &str) -> StoreResult<bool> {
        let pattern = self.keys.workflow_pattern(Some(name), None)?;
        self.delete_workflows(&pattern)
    }

    /// Persists a new job carrying a snapshot of `workflow`.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the write fails.
    pub fn persist_job(&self, workflow: &Workflow, payload: Value) -> StoreResult<Job> {
        let job = Job::new(workflow.clone(), payload, &*self.clock);
        self.store
            .set_fields(&self.keys.job_key(job.id()), &records::job_fields(&job)?)?;
        debug!(job_id = %job.id(), workflow_id = %workflow.id(), "persisted job");
        Ok(job)
    }

    /// Finds a job by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRecord`] when the stored record is
    /// malformed, or a backend error.
    pub fn find_job(&self, id: JobId) -> StoreResult<Option<Job>> {
        let key = self.keys.job_key(id);
        records::decode_job(&key, &self.store.get_all_fields(&key)?)
    }

    /// Lists at most `limit` jobs after skipping `offset`, by creation time.
    ///
    /// Jobs created at the same instant are ordered by identifier. An
    /// `offset` past the end yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRecord`] when a stored job is malformed,
    /// or a backend error.
    pub fn select_jobs(
        &self,
        limit: usize,
        offset: usize,
        order: SortOrder,
    ) -> StoreResult<Vec<Job>> {
        let mut jobs = Vec::new();
        for key in self.store.list_keys(&self.keys.job_pattern())? {
            if let Some(job) = records::decode_job(&key, &self.store.get_all_fields(&key)?)? {
                jobs.push(job);
            }
        }

        jobs.sort_by_key(|job| (job.created_at(), job.id()));
        if order == SortOrder::Descending {
            jobs.reverse();
        }
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    /// Returns the number of stored jobs.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the scan fails.
    pub fn count_jobs(&self) -> StoreResult<usize> {
        Ok(self.store.list_keys(&self.keys.job_pattern())?.len())
    }

    /// Deletes a job by identifier. Tasks of the job are kept.
    ///
    /// # Errors
    ///
    /// Returns a backend error when the delete fails.
    pub fn delete_job(&self, id: JobId) -> StoreResult<bool> {
        let removed = self.store.delete(&self.keys.job_key(id))?;
        debug!(job_id = %id, removed, "deleted job");
        Ok(removed)
    }

    /// Returns every task of a job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRecord`] when a stored task is
    /// malformed, or a backend error.
    pub fn select_tasks_by_job_id(&self, job_id: JobId) -> StoreResult<Vec<Task>> {
        let pattern = self.keys.task_pattern(&TaskKeyFilter {
            job_id: Some(job_id),
            ..TaskKeyFilter::default()
        })?;

        let mut tasks = Vec::new();
        for key in self.sorted_keys(&pattern)? {
            if let Some(task) = records::decode_task(&key, &self.store.get_all_fields(&key)?)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    /// Finds a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptRecord`] when the stored record is
    /// malformed, or a backend error.
    pub fn find_task(&self, id: TaskId) -> StoreResult<Option<Task>> {
        let Some(key) = self.task_key_for(id)? else {
            return Ok(None);
        };
        records::decode_task(&key, &self.store.get_all_fields(&key)?)
    }

    /// Returns the identifiers of a job's tasks with the given name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when `name` contains the key
    /// separator, or a backend error.
    pub fn find_task_ids_by_job_id_and_name(
        &self,
        job_id: JobId,
        name: &str,
    ) -> StoreResult<BTreeSet<TaskId>> {
        self.task_ids(&TaskKeyFilter {
            name: Some(name),
            job_id: Some(job_id),
            ..TaskKeyFilter::default()
        })
    }

    /// Returns the identifiers of a job's tasks with the given name whose
    /// parent is any of `parent_task_ids`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`] when `name` contains the key
    /// separator, or a backend error.
    pub fn find_task_ids_by_job_id_name_and_parent_task_ids(
        &self,
        job_id: JobId,
        name: &str,
        parent_task_ids: &[TaskId],
    ) -> StoreResult<BTreeSet<TaskId>> {
        let mut ids = BTreeSet::new();
        for parent in parent_task_ids {
            ids.extend(self.task_ids(&TaskKeyFilter {
                name: Some(name),
                job_id: Some(job_id),
                parent: ParentFilter::Parent(*parent),
                ..TaskKeyFilter::default()
            })?);
        }
        Ok(ids)
    }

    /// Sets the free-text status label of a task.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when no task has `id`, or a
    /// backend error.
    pub fn update_status(&self, id: TaskId, status: &str) -> StoreResult<bool> {
        let key = self.task_key_for(id)?.ok_or(StoreError::TaskNotFound(id))?;
        let expected = FieldExpectations::from([(records::ID.to_owned(), Some(id.to_string()))]);
        let updates = FieldMap::from([(records::STATUS.to_owned(), status.to_owned())]);

        if !self.store.compare_and_set_fields(&key, &expected, &updates)? {
            return Err(StoreError::TaskNotFound(id));
        }
        debug!(task_id = %id, status = %status, "updated task status");
        Ok(true)
    }

    /// Returns the record key of the task with `id`, if stored.
    pub(crate) fn task_key_for(&self, id: TaskId) -> StoreResult<Option<String>> {
        let pattern = self.keys.task_pattern(&TaskKeyFilter {
            id: Some(id),
            ..TaskKeyFilter::default()
        })?;
        Ok(self.sorted_keys(&pattern)?.into_iter().next())
    }

    /// Writes the record of a freshly materialized task.
    pub(crate) fn write_new_task(&self, task: &Task) -> StoreResult<()> {
        let key = self.keys.task_key(&TaskKeyParts {
            name: task.name().to_owned(),
            queue_name: task.queue_name().to_owned(),
            job_id: task.job_id(),
            parent_task_id: task.parent_task_id(),
            id: task.id(),
        })?;
        self.store
            .set_fields(&key, &records::new_task_fields(task)?)?;
        Ok(())
    }

    /// Returns the task identifiers encoded in the keys matching `filter`.
    pub(crate) fn task_ids(&self, filter: &TaskKeyFilter<'_>) -> StoreResult<BTreeSet<TaskId>> {
        let pattern = self.keys.task_pattern(filter)?;
        let mut ids = BTreeSet::new();
        for key in self.store.list_keys(&pattern)? {
            let ParsedKey::Task(parts) = self.keys.parse(&key)? else {
                return Err(KeyError::UnrecognizedKey(key).into());
            };
            ids.insert(parts.id);
        }
        Ok(ids)
    }

    pub(crate) fn sorted_keys(&self, pattern: &KeyPattern) -> StoreResult<Vec<String>> {
        let mut keys = self.store.list_keys(pattern)?;
        keys.sort();
        Ok(keys)
    }

    fn first_workflow(&self, pattern: &KeyPattern) -> StoreResult<Option<Workflow>> {
        for key in self.sorted_keys(pattern)? {
            if let Some(workflow) =
                records::decode_workflow(&key, &self.store.get_all_fields(&key)?)?
            {
                return Ok(Some(workflow));
            }
        }
        Ok(None)
    }

    fn delete_workflows(&self, pattern: &KeyPattern) -> StoreResult<bool> {
        let mut removed = false;
        for key in self.sorted_keys(pattern)? {
            let ParsedKey::Workflow { name, id } = self.keys.parse(&key)? else {
                return Err(KeyError::UnrecognizedKey(key).into());
            };
            // The claim goes first: a record without a claim still blocks its
            // name, a claim without a record would need a takeover.
            self.release_name_claim(&name, id)?;
            if self.store.delete(&key)? {
                debug!(workflow_id = %id, name = %name, "deleted workflow");
                removed = true;
            }
        }
        Ok(removed)
    }

    fn name_claim(&self, id: WorkflowId) -> FieldMap {
        FieldMap::from([
            (records::WORKFLOW_ID.to_owned(), id.to_string()),
            (
                records::CLAIMED_AT.to_owned(),
                records::encode_timestamp(self.clock.utc()),
            ),
        ])
    }

    fn write_workflow(&self, workflow: &Workflow) -> StoreResult<()> {
        let key = self.keys.workflow_key(workflow.name(), workflow.id())?;
        self.store
            .set_fields(&key, &records::workflow_fields(workflow)?)?;
        Ok(())
    }

    fn release_name_claim(&self, name: &str, id: WorkflowId) -> StoreResult<()> {
        let claim_key = self.keys.workflow_name_claim_key(name)?;
        let owner = self.store.get_field(&claim_key, records::WORKFLOW_ID)?;
        if owner.as_deref() == Some(id.to_string().as_str()) {
            self.store.delete(&claim_key)?;
        }
        Ok(())
    }

    /// Replaces a name claim whose creator never wrote the workflow record.
    ///
    /// A claim younger than [`STALE_CLAIM_AGE`] belongs to a creator that may
    /// still be writing, so it is left alone.
    fn take_over_stale_claim(
        &self,
        name: &str,
        claim_key: &str,
        claim: &FieldMap,
    ) -> StoreResult<bool> {
        let current = self.store.get_all_fields(claim_key)?;
        if current.is_empty() {
            return Ok(self.store.set_fields_if_absent(claim_key, claim)?);
        }
        if self.find_workflow_by_name(name)?.is_some() {
            return Ok(false);
        }

        let claimed_at = records::non_empty(&current, records::CLAIMED_AT)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|value| value.with_timezone(&Utc));
        let now = self.clock.utc();
        if claimed_at.is_some_and(|at| now.signed_duration_since(at) < STALE_CLAIM_AGE) {
            return Ok(false);
        }

        let expected: FieldExpectations = [records::WORKFLOW_ID, records::CLAIMED_AT]
            .into_iter()
            .map(|field| (field.to_owned(), current.get(field).cloned()))
            .collect();
        let taken = self
            .store
            .compare_and_set_fields(claim_key, &expected, claim)?;
        if taken {
            warn!(
                name = %name,
                stale_workflow_id = current.get(records::WORKFLOW_ID).map_or("", String::as_str),
                "took over abandoned workflow name claim"
            );
        }
        Ok(taken)
    }
}
