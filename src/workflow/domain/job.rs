//! Job aggregate: one execution instance of a workflow.

use super::{JobId, Workflow};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::Value;

/// Stored job.
///
/// A job carries a full snapshot of its workflow taken at creation time, so
/// later changes to (or deletion of) the workflow never affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: JobId,
    workflow: Workflow,
    payload: Value,
    created_at: DateTime<Utc>,
}

impl Job {
    /// Creates a job with a freshly generated identifier.
    #[must_use]
    pub fn new(workflow: Workflow, payload: Value, clock: &impl Clock) -> Self {
        Self::from_persisted(JobId::new(), workflow, payload, clock.utc())
    }

    /// Reconstructs a job from stored values.
    #[must_use]
    pub const fn from_persisted(
        id: JobId,
        workflow: Workflow,
        payload: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            workflow,
            payload,
            created_at,
        }
    }

    /// Returns the job identifier.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the workflow snapshot captured when the job was created.
    #[must_use]
    pub const fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Returns the opaque job payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordering applied when listing jobs by creation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    Ascending,
    /// Newest first.
    Descending,
}
