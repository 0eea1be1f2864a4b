//! Parsed representation of entity keys.

use crate::workflow::domain::{JobId, TaskId, WorkflowId};

/// Relationship fields encoded in a task key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskKeyParts {
    /// Task name.
    pub name: String,
    /// Queue name.
    pub queue_name: String,
    /// Owning job.
    pub job_id: JobId,
    /// Parent task, if any.
    pub parent_task_id: Option<TaskId>,
    /// Task identifier.
    pub id: TaskId,
}

/// Entity kind and fields recovered from a full key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedKey {
    /// A workflow record key.
    Workflow {
        /// Workflow name.
        name: String,
        /// Workflow identifier.
        id: WorkflowId,
    },
    /// A job record key.
    Job {
        /// Job identifier.
        id: JobId,
    },
    /// A task record key.
    Task(TaskKeyParts),
}

/// Parses the segments following the namespace and entity kind.
pub(super) fn parse_entity(kind: &str, rest: &[&str]) -> Option<ParsedKey> {
    match (kind, rest) {
        (super::WORKFLOW_SEGMENT, [name, id]) => Some(ParsedKey::Workflow {
            name: (*name).to_owned(),
            id: id.parse().ok()?,
        }),
        (super::JOB_SEGMENT, [id]) => Some(ParsedKey::Job {
            id: id.parse().ok()?,
        }),
        (super::TASK_SEGMENT, [name, queue_name, job_id, parent, id]) => {
            let parent_task_id = if parent.is_empty() {
                None
            } else {
                Some(parent.parse().ok()?)
            };
            Some(ParsedKey::Task(TaskKeyParts {
                name: (*name).to_owned(),
                queue_name: (*queue_name).to_owned(),
                job_id: job_id.parse().ok()?,
                parent_task_id,
                id: id.parse().ok()?,
            }))
        }
        _ => None,
    }
}
