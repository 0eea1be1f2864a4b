//! Orchestration services for workflow, job and task persistence.

mod deduplication;
mod entity_store;
mod error;
mod lease;
mod records;
mod workflow_store;

pub use deduplication::DeduplicationResolver;
pub use entity_store::{EntityStore, STALE_CLAIM_AGE};
pub use error::{StoreError, StoreResult};
pub use lease::LeaseManager;
pub use workflow_store::WorkflowStore;
