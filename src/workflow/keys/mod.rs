//! Composite record keys and scan patterns for the flat key namespace.
//!
//! Entity relationships live in the keys themselves so that "find by field"
//! queries become segment patterns:
//!
//! - `<ns>:workflow:<name>:<id>`
//! - `<ns>:job:<id>`
//! - `<ns>:task:<name>:<queue>:<job>:<parent>:<id>` (empty parent for roots)
//!
//! Two claim keys back the race-free uniqueness checks:
//!
//! - `<ns>:workflow-name:<name>`
//! - `<ns>:task-identity:<name>:<queue>:<job>:<parent>:<payload digest>`
//!
//! Every lookup through a pattern costs a scan of the matching keys; no
//! secondary index is maintained.

mod parsed;

pub use parsed::{ParsedKey, TaskKeyParts};

use crate::kv::domain::{KEY_SEPARATOR, KeyPattern};
use crate::workflow::domain::{JobId, TaskId, WorkflowId};
use thiserror::Error;

const WORKFLOW_SEGMENT: &str = "workflow";
const JOB_SEGMENT: &str = "job";
const TASK_SEGMENT: &str = "task";
const WORKFLOW_NAME_CLAIM_SEGMENT: &str = "workflow-name";
const TASK_IDENTITY_CLAIM_SEGMENT: &str = "task-identity";

/// Errors raised while building or parsing keys.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// A key segment contains the separator and would corrupt the layout.
    #[error("{field} '{value}' must not contain '{separator}'", separator = KEY_SEPARATOR)]
    InvalidSegment {
        /// Name of the offending field.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// A stored key does not follow any known layout.
    #[error("unrecognized key '{0}'")]
    UnrecognizedKey(String),
}

/// Parent constraint applied to task scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// Any parent, including none.
    #[default]
    Any,
    /// Root tasks only.
    Root,
    /// Children of this task only.
    Parent(TaskId),
}

impl From<Option<TaskId>> for ParentFilter {
    fn from(parent: Option<TaskId>) -> Self {
        parent.map_or(Self::Root, Self::Parent)
    }
}

/// Field constraints for a task key scan; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskKeyFilter<'a> {
    /// Task name.
    pub name: Option<&'a str>,
    /// Queue name.
    pub queue_name: Option<&'a str>,
    /// Owning job.
    pub job_id: Option<JobId>,
    /// Parent constraint.
    pub parent: ParentFilter,
    /// Task identifier.
    pub id: Option<TaskId>,
}

/// Builds and parses namespaced record keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyIndex {
    namespace: String,
}

impl KeyIndex {
    /// Creates a key index rooted at `namespace`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when the namespace contains the
    /// key separator.
    pub fn new(namespace: impl Into<String>) -> Result<Self, KeyError> {
        let value = namespace.into();
        checked("namespace", &value)?;
        Ok(Self { namespace: value })
    }

    /// Returns the namespace prefix.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the record key of a workflow.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when `name` contains the
    /// separator.
    pub fn workflow_key(&self, name: &str, id: WorkflowId) -> Result<String, KeyError> {
        Ok(self.join(&[WORKFLOW_SEGMENT, checked("workflow name", name)?, &id.to_string()]))
    }

    /// Returns the record key of a job.
    #[must_use]
    pub fn job_key(&self, id: JobId) -> String {
        self.join(&[JOB_SEGMENT, &id.to_string()])
    }

    /// Returns the record key of a task.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when the name or queue contains
    /// the separator.
    pub fn task_key(&self, parts: &TaskKeyParts) -> Result<String, KeyError> {
        Ok(self.join(&[
            TASK_SEGMENT,
            checked("task name", &parts.name)?,
            checked("queue name", &parts.queue_name)?,
            &parts.job_id.to_string(),
            &parent_segment(parts.parent_task_id),
            &parts.id.to_string(),
        ]))
    }

    /// Returns the pattern matching workflows by name and/or id.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when `name` contains the
    /// separator.
    pub fn workflow_pattern(
        &self,
        name: Option<&str>,
        id: Option<WorkflowId>,
    ) -> Result<KeyPattern, KeyError> {
        let checked_name = name
            .map(|value| checked("workflow name", value))
            .transpose()?;
        Ok(self
            .pattern(WORKFLOW_SEGMENT)
            .exact_or_any(checked_name)
            .exact_or_any(id.map(|value| value.to_string())))
    }

    /// Returns the pattern matching every job.
    #[must_use]
    pub fn job_pattern(&self) -> KeyPattern {
        self.pattern(JOB_SEGMENT).any()
    }

    /// Returns the pattern matching tasks that satisfy `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when a name or queue constraint
    /// contains the separator.
    pub fn task_pattern(&self, filter: &TaskKeyFilter<'_>) -> Result<KeyPattern, KeyError> {
        let name = filter
            .name
            .map(|value| checked("task name", value))
            .transpose()?;
        let queue_name = filter
            .queue_name
            .map(|value| checked("queue name", value))
            .transpose()?;
        let parent = match filter.parent {
            ParentFilter::Any => None,
            ParentFilter::Root => Some(String::new()),
            ParentFilter::Parent(id) => Some(id.to_string()),
        };

        Ok(self
            .pattern(TASK_SEGMENT)
            .exact_or_any(name)
            .exact_or_any(queue_name)
            .exact_or_any(filter.job_id.map(|value| value.to_string()))
            .exact_or_any(parent)
            .exact_or_any(filter.id.map(|value| value.to_string())))
    }

    /// Returns the claim key reserving a workflow name.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when `name` contains the
    /// separator.
    pub fn workflow_name_claim_key(&self, name: &str) -> Result<String, KeyError> {
        Ok(self.join(&[WORKFLOW_NAME_CLAIM_SEGMENT, checked("workflow name", name)?]))
    }

    /// Returns the claim key reserving a task identity and payload digest.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::InvalidSegment`] when the name or queue contains
    /// the separator.
    pub fn task_identity_claim_key(
        &self,
        name: &str,
        queue_name: &str,
        job_id: JobId,
        parent_task_id: Option<TaskId>,
        payload_digest: &str,
    ) -> Result<String, KeyError> {
        Ok(self.join(&[
            TASK_IDENTITY_CLAIM_SEGMENT,
            checked("task name", name)?,
            checked("queue name", queue_name)?,
            &job_id.to_string(),
            &parent_segment(parent_task_id),
            checked("payload digest", payload_digest)?,
        ]))
    }

    /// Parses a full entity key produced by this index.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::UnrecognizedKey`] when the key belongs to another
    /// namespace, is a claim key, or has malformed segments.
    pub fn parse(&self, key: &str) -> Result<ParsedKey, KeyError> {
        let unrecognized = || KeyError::UnrecognizedKey(key.to_owned());
        let mut segments = key.split(KEY_SEPARATOR);
        if segments.next() != Some(self.namespace.as_str()) {
            return Err(unrecognized());
        }
        let kind = segments.next().ok_or_else(unrecognized)?;
        let rest: Vec<&str> = segments.collect();
        parsed::parse_entity(kind, &rest).ok_or_else(unrecognized)
    }

    fn pattern(&self, entity: &str) -> KeyPattern {
        KeyPattern::new().exact(self.namespace.as_str()).exact(entity)
    }

    fn join(&self, segments: &[&str]) -> String {
        let mut key = self.namespace.clone();
        for segment in segments {
            key.push(KEY_SEPARATOR);
            key.push_str(segment);
        }
        key
    }
}

fn checked<'a>(field: &'static str, value: &'a str) -> Result<&'a str, KeyError> {
    if value.contains(KEY_SEPARATOR) {
        return Err(KeyError::InvalidSegment {
            field,
            value: value.to_owned(),
        });
    }
    Ok(value)
}

fn parent_segment(parent_task_id: Option<TaskId>) -> String {
    parent_task_id.map(|id| id.to_string()).unwrap_or_default()
}
