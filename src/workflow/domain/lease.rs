//! Lease granted by a successful task lock.

use super::LeaseToken;
use chrono::{DateTime, Utc};

/// Time-bounded exclusive claim on a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

impl Lease {
    /// Creates a lease.
    #[must_use]
    pub const fn new(token: LeaseToken, expires_at: DateTime<Utc>) -> Self {
        Self { token, expires_at }
    }

    /// Returns the holder token required to renew or release the lease.
    #[must_use]
    pub const fn token(&self) -> &LeaseToken {
        &self.token
    }

    /// Returns the instant after which the lease no longer excludes others.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
