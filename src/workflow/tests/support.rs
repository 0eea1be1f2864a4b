//! Shared fixtures for workflow service tests.

use std::sync::{Arc, Mutex};

use crate::config::StoreConfig;
use crate::kv::adapters::memory::InMemoryKeyValueStore;
use crate::workflow::services::WorkflowStore;
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use rstest::fixture;

/// Clock that only moves when told to.
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub(super) fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock should not be poisoned");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock should not be poisoned")
    }
}

pub(super) type TestStore = WorkflowStore<InMemoryKeyValueStore, ManualClock>;

pub(super) struct Harness {
    pub(super) kv: Arc<InMemoryKeyValueStore>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) store: TestStore,
}

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("valid start time")
}

#[fixture]
pub(super) fn harness() -> Harness {
    let kv = Arc::new(InMemoryKeyValueStore::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let store = WorkflowStore::new(
        Arc::clone(&kv),
        Arc::clone(&clock),
        &StoreConfig::in_memory("test"),
    )
    .expect("test configuration is valid");
    Harness { kv, clock, store }
}
