//! Lock, renew and unlock across pooled connections.

use std::sync::Barrier;
use std::thread;

use super::helpers::setup_store;
use chrono::TimeDelta;
use eyre::{Result, eyre};
use flowstore::workflow::domain::NewTask;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[ignore = "requires FLOWSTORE_TEST_DATABASE_URL"]
fn lease_lifecycle_honours_expiry() -> Result<()> {
    let context = setup_store()?;
    let entities = context.store.entities();
    let workflow = entities.persist_workflow("leases", json!({}))?;
    let job = entities.persist_job(&workflow, json!({}))?;
    let task_id = context
        .store
        .deduplication()
        .find_or_persist_task(NewTask::new("t", "q", json!({}), job.id()))?;
    let leases = context.store.leases();

    let lease = leases
        .lock(task_id, 30)?
        .ok_or_else(|| eyre!("fresh task should be lockable"))?;
    assert!(leases.lock(task_id, 30)?.is_none());

    context.clock.advance(TimeDelta::seconds(30));
    assert!(leases.renew(task_id, 30, lease.token())?.is_none());
    let successor = leases
        .lock(task_id, 30)?
        .ok_or_else(|| eyre!("expired lease should be reclaimable"))?;

    assert!(!leases.unlock(task_id, lease.token())?);
    assert!(leases.unlock(task_id, successor.token())?);
    let task = entities
        .find_task(task_id)?
        .ok_or_else(|| eyre!("task should exist"))?;
    assert!(task.locked_by().is_none());
    assert!(task.locked_until().is_none());
    Ok(())
}

#[rstest]
#[ignore = "requires FLOWSTORE_TEST_DATABASE_URL"]
fn concurrent_lock_grants_one_lease_across_connections() -> Result<()> {
    const WORKERS: usize = 6;
    let context = setup_store()?;
    let entities = context.store.entities();
    let workflow = entities.persist_workflow("race", json!({}))?;
    let job = entities.persist_job(&workflow, json!({}))?;
    let task_id = context
        .store
        .deduplication()
        .find_or_persist_task(NewTask::new("t", "q", json!({}), job.id()))?;
    let barrier = Barrier::new(WORKERS);

    let granted = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let leases = context.store.leases().clone();
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    leases.lock(task_id, 30)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    assert_eq!(granted.iter().flatten().count(), 1);
    Ok(())
}
