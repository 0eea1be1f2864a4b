//! Task aggregate and the request used to materialize one.

use super::{JobId, LeaseToken, TaskId};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Identity and payload of a task to materialize.
///
/// Two requests denote the same task when name, queue, job and parent are
/// equal and the payloads are structurally equal after normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    name: String,
    queue_name: String,
    payload: Value,
    job_id: JobId,
    parent_task_id: Option<TaskId>,
}

impl NewTask {
    /// Creates a root task request.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        queue_name: impl Into<String>,
        payload: Value,
        job_id: JobId,
    ) -> Self {
        Self {
            name: name.into(),
            queue_name: queue_name.into(),
            payload,
            job_id,
            parent_task_id: None,
        }
    }

    /// Sets the parent task.
    #[must_use]
    pub const fn with_parent(mut self, parent_task_id: TaskId) -> Self {
        self.parent_task_id = Some(parent_task_id);
        self
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the queue name.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Returns the opaque task payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the owning job.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns the parent task, if any.
    #[must_use]
    pub const fn parent_task_id(&self) -> Option<TaskId> {
        self.parent_task_id
    }

    /// Builds the stored task for `id` with no status and no lock.
    #[must_use]
    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            name: self.name,
            queue_name: self.queue_name,
            payload: self.payload,
            job_id: self.job_id,
            parent_task_id: self.parent_task_id,
            status: None,
            locked_by: None,
            locked_until: None,
        }
    }
}

/// Stored task snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    name: String,
    queue_name: String,
    payload: Value,
    job_id: JobId,
    parent_task_id: Option<TaskId>,
    status: Option<String>,
    locked_by: Option<LeaseToken>,
    locked_until: Option<DateTime<Utc>>,
}

/// Persisted task fields used to reconstruct a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Task identifier.
    pub id: TaskId,
    /// Task name.
    pub name: String,
    /// Queue the task is dispatched to.
    pub queue_name: String,
    /// Opaque task payload.
    pub payload: Value,
    /// Owning job.
    pub job_id: JobId,
    /// Parent task, if any.
    pub parent_task_id: Option<TaskId>,
    /// Caller-defined status label; `None` until first set.
    pub status: Option<String>,
    /// Current lease holder.
    pub locked_by: Option<LeaseToken>,
    /// Current lease expiry.
    pub locked_until: Option<DateTime<Utc>>,
}

impl Task {
    /// Reconstructs a task from persisted storage data.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            name: data.name,
            queue_name: data.queue_name,
            payload: data.payload,
            job_id: data.job_id,
            parent_task_id: data.parent_task_id,
            status: data.status,
            locked_by: data.locked_by,
            locked_until: data.locked_until,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the queue name.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Returns the opaque task payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the owning job.
    #[must_use]
    pub const fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Returns the parent task, if any.
    #[must_use]
    pub const fn parent_task_id(&self) -> Option<TaskId> {
        self.parent_task_id
    }

    /// Returns the status label, or `None` when it was never set.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Returns the current lease holder, if any.
    #[must_use]
    pub const fn locked_by(&self) -> Option<&LeaseToken> {
        self.locked_by.as_ref()
    }

    /// Returns the current lease expiry, if any.
    #[must_use]
    pub const fn locked_until(&self) -> Option<DateTime<Utc>> {
        self.locked_until
    }
}
