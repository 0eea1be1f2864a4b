//! Workflow aggregate: a named, reusable process template.

use super::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored workflow definition.
///
/// The descriptor is opaque to the store; only the workflow engine
/// interprets it. Workflows are immutable once persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    descriptor: Value,
}

impl Workflow {
    /// Creates a workflow with a freshly generated identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, descriptor: Value) -> Self {
        Self::from_persisted(WorkflowId::new(), name, descriptor)
    }

    /// Reconstructs a workflow from stored values.
    #[must_use]
    pub fn from_persisted(id: WorkflowId, name: impl Into<String>, descriptor: Value) -> Self {
        Self {
            id,
            name: name.into(),
            descriptor,
        }
    }

    /// Returns the workflow identifier.
    #[must_use]
    pub const fn id(&self) -> WorkflowId {
        self.id
    }

    /// Returns the unique workflow name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the opaque workflow descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &Value {
        &self.descriptor
    }
}
