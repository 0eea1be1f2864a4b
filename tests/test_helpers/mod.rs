//! Shared clock and environment helpers for integration tests.

use std::env;
use std::sync::{Mutex, OnceLock, PoisonError};

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;

const STORE_PREFIX: &str = "FLOWSTORE_";

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Clock that only moves when advanced explicitly.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at a fixed instant.
    pub fn frozen() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
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

/// Runs `body` with the `FLOWSTORE_*` variables set to exactly `vars`.
///
/// Every other `FLOWSTORE_*` variable is hidden for the duration, so the
/// host environment cannot leak into configuration tests. Calls are
/// serialized and the previous values are restored afterwards.
pub fn with_store_env<T>(vars: &[(&str, &str)], body: impl FnOnce() -> T) -> T {
    let _serialized = ENV_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    let saved: Vec<(String, String)> = env::vars()
        .filter(|(name, _)| name.starts_with(STORE_PREFIX))
        .collect();

    replace_store_env(vars.iter().map(|(name, value)| (*name, *value)));
    let result = body();
    replace_store_env(saved.iter().map(|(name, value)| (name.as_str(), value.as_str())));
    result
}

fn replace_store_env<'a>(vars: impl Iterator<Item = (&'a str, &'a str)>) {
    let stale: Vec<String> = env::vars()
        .map(|(name, _)| name)
        .filter(|name| name.starts_with(STORE_PREFIX))
        .collect();
    // SAFETY: ENV_MUTEX is held by the only caller, and no other test
    // thread reads FLOWSTORE_* variables outside it.
    unsafe {
        for name in stale {
            env::remove_var(name);
        }
        for (name, value) in vars {
            env::set_var(name, value);
        }
    }
}
