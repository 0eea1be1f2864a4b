//! Lease-based mutual exclusion on tasks.
//!
//! The lease lives in the task record itself (`locked_by`, `locked_until`).
//! Every state change is a single compare-and-set conditioned on the lock
//! fields this call observed, so two workers can never both win a lease.
//! Expiry is lazy: there is no sweeper, and each call compares the stored
//! expiry with the injected clock.

use super::{EntityStore, StoreError, StoreResult, records};
use crate::kv::{
    domain::{FieldExpectations, FieldMap},
    ports::KeyValueStore,
};
use crate::workflow::domain::{Lease, LeaseToken, TaskId};
use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use mockable::Clock;
use tracing::debug;

/// Task lease service.
pub struct LeaseManager<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    entities: EntityStore<S, C>,
}

impl<S, C> Clone for LeaseManager<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            entities: self.entities.clone(),
        }
    }
}

impl<S, C> LeaseManager<S, C>
where
    S: KeyValueStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a lease manager over `entities`.
    #[must_use]
    pub const fn new(entities: EntityStore<S, C>) -> Self {
        Self { entities }
    }

    /// Acquires the lease on a task for `lease_seconds`.
    ///
    /// Returns `None` when another holder's lease is still valid, or when a
    /// concurrent caller won the race for the same lock state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when no task has `task_id`,
    /// [`StoreError::CorruptRecord`] when the stored expiry is malformed, or
    /// a backend error.
    pub fn lock(&self, task_id: TaskId, lease_seconds: u32) -> StoreResult<Option<Lease>> {
        let (key, fields) = self.load_task_fields(task_id)?;
        let now = self.entities.clock().utc();
        let holder = records::non_empty(&fields, records::LOCKED_BY);
        let unexpired = records::decode_lock_expiry(&key, &fields)?.is_some_and(|until| until > now);
        if holder.is_some() && unexpired {
            debug!(task_id = %task_id, holder = holder.unwrap_or_default(), "task lease is held");
            return Ok(None);
        }

        let lease = Lease::new(LeaseToken::new(), lease_expiry(now, lease_seconds));
        let updates = FieldMap::from([
            (records::LOCKED_BY.to_owned(), lease.token().as_str().to_owned()),
            (
                records::LOCKED_UNTIL.to_owned(),
                records::encode_timestamp(lease.expires_at()),
            ),
        ]);
        if !self
            .entities
            .store()
            .compare_and_set_fields(&key, &observed_lock(&fields), &updates)?
        {
            debug!(task_id = %task_id, "lost task lease race");
            return Ok(None);
        }

        debug!(
            task_id = %task_id,
            token = %lease.token(),
            expires_at = %lease.expires_at(),
            "acquired task lease"
        );
        Ok(Some(lease))
    }

    /// Extends a held lease to `lease_seconds` from now.
    ///
    /// Returns the new expiry, or `None` when `token` does not hold an
    /// unexpired lease. The record is unchanged in that case.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when no task has `task_id`,
    /// [`StoreError::CorruptRecord`] when the stored expiry is malformed, or
    /// a backend error.
    pub fn renew(
        &self,
        task_id: TaskId,
        lease_seconds: u32,
        token: &LeaseToken,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let (key, fields) = self.load_task_fields(task_id)?;
        let now = self.entities.clock().utc();
        let held = records::non_empty(&fields, records::LOCKED_BY) == Some(token.as_str());
        let unexpired = records::decode_lock_expiry(&key, &fields)?.is_some_and(|until| until > now);
        if !(held && unexpired) {
            debug!(task_id = %task_id, token = %token, held, unexpired, "refused lease renewal");
            return Ok(None);
        }

        let expires_at = lease_expiry(now, lease_seconds);
        let updates = FieldMap::from([(
            records::LOCKED_UNTIL.to_owned(),
            records::encode_timestamp(expires_at),
        )]);
        if !self
            .entities
            .store()
            .compare_and_set_fields(&key, &observed_lock(&fields), &updates)?
        {
            debug!(task_id = %task_id, token = %token, "lease changed during renewal");
            return Ok(None);
        }

        debug!(task_id = %task_id, token = %token, expires_at = %expires_at, "renewed task lease");
        Ok(Some(expires_at))
    }

    /// Releases the lease held by `token`.
    ///
    /// Returns `false`, leaving the record untouched, when `token` is not the
    /// current holder.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`] when no task has `task_id`, or a
    /// backend error.
    pub fn unlock(&self, task_id: TaskId, token: &LeaseToken) -> StoreResult<bool> {
        let (key, fields) = self.load_task_fields(task_id)?;
        if records::non_empty(&fields, records::LOCKED_BY) != Some(token.as_str()) {
            debug!(task_id = %task_id, token = %token, "refused unlock by non-holder");
            return Ok(false);
        }

        let expected = FieldExpectations::from([(
            records::LOCKED_BY.to_owned(),
            Some(token.as_str().to_owned()),
        )]);
        let cleared = FieldMap::from([
            (records::LOCKED_BY.to_owned(), String::new()),
            (records::LOCKED_UNTIL.to_owned(), String::new()),
        ]);
        let released = self
            .entities
            .store()
            .compare_and_set_fields(&key, &expected, &cleared)?;
        debug!(task_id = %task_id, token = %token, released, "released task lease");
        Ok(released)
    }

    fn load_task_fields(&self, task_id: TaskId) -> StoreResult<(String, FieldMap)> {
        let key = self
            .entities
            .task_key_for(task_id)?
            .ok_or(StoreError::TaskNotFound(task_id))?;
        let fields = self.entities.store().get_all_fields(&key)?;
        if fields.is_empty() {
            return Err(StoreError::TaskNotFound(task_id));
        }
        Ok((key, fields))
    }
}

/// Expectations pinning both lock fields to the values read earlier.
fn observed_lock(fields: &FieldMap) -> FieldExpectations {
    [records::LOCKED_BY, records::LOCKED_UNTIL]
        .into_iter()
        .map(|field| (field.to_owned(), fields.get(field).cloned()))
        .collect()
}

/// Returns `now + lease_seconds` at the precision stored in records.
fn lease_expiry(now: DateTime<Utc>, lease_seconds: u32) -> DateTime<Utc> {
    now.checked_add_signed(TimeDelta::seconds(i64::from(lease_seconds)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
        .trunc_subsecs(6)
}
