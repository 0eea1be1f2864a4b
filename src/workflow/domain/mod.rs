//! Domain model for workflow, job and task persistence.
//!
//! These types are plain snapshots. They carry no storage concerns; key
//! layout and record encoding live in [`crate::workflow::keys`] and the
//! services.

mod ids;
mod job;
mod lease;
mod task;
mod workflow;

pub use ids::{JobId, LeaseToken, TaskId, WorkflowId};
pub use job::{Job, SortOrder};
pub use lease::Lease;
pub use task::{NewTask, PersistedTaskData, Task};
pub use workflow::Workflow;
