//! Shared fixtures for in-memory workflow store integration tests.

use std::sync::Arc;

use crate::test_helpers::ManualClock;
use flowstore::config::StoreConfig;
use flowstore::kv::adapters::memory::InMemoryKeyValueStore;
use flowstore::workflow::services::WorkflowStore;
use rstest::fixture;

/// Workflow store over the in-memory adapter with a manual clock.
pub type MemoryStore = WorkflowStore<InMemoryKeyValueStore, ManualClock>;

/// Store under test together with its clock.
pub struct Context {
    /// Clock driving lease expiry.
    pub clock: Arc<ManualClock>,
    /// Services under test.
    pub store: MemoryStore,
}

/// Provides a fresh store for each test.
#[fixture]
pub fn context() -> Context {
    let clock = Arc::new(ManualClock::frozen());
    let store = WorkflowStore::new(
        Arc::new(InMemoryKeyValueStore::new()),
        Arc::clone(&clock),
        &StoreConfig::in_memory("integration"),
    )
    .expect("in-memory configuration is valid");
    Context { clock, store }
}
