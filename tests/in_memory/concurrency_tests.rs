//! Workers racing on one shared store.

use std::sync::Barrier;
use std::thread;

use super::helpers::{Context, context};
use eyre::Result;
use flowstore::workflow::domain::{NewTask, TaskId};
use rstest::rstest;
use serde_json::json;

const WORKERS: usize = 8;

fn seeded_task(context: &Context) -> Result<TaskId> {
    let entities = context.store.entities();
    let workflow = entities.persist_workflow("race", json!({}))?;
    let job = entities.persist_job(&workflow, json!({}))?;
    Ok(context
        .store
        .deduplication()
        .find_or_persist_task(NewTask::new("t", "q", json!({"x": 1}), job.id()))?)
}

#[rstest]
fn concurrent_lock_grants_exactly_one_lease(context: Context) -> Result<()> {
    let task_id = seeded_task(&context)?;
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

#[rstest]
fn concurrent_find_or_persist_resolves_to_one_task(context: Context) -> Result<()> {
    let entities = context.store.entities();
    let workflow = entities.persist_workflow("dedup-race", json!({}))?;
    let job = entities.persist_job(&workflow, json!({}))?;
    let barrier = Barrier::new(WORKERS);

    let ids = thread::scope(|scope| {
        let handles: Vec<_> = (0..WORKERS)
            .map(|worker| {
                let resolver = context.store.deduplication().clone();
                let barrier = &barrier;
                // Key order differs per worker; the payloads are equivalent.
                let payload = if worker.is_multiple_of(2) {
                    json!({"a": 1, "b": [1, 2]})
                } else {
                    json!({"b": [1, 2], "a": 1.0})
                };
                let request = NewTask::new("t", "q", payload, job.id());
                scope.spawn(move || {
                    barrier.wait();
                    resolver.find_or_persist_task(request)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread panicked"))
            .collect::<Result<Vec<_>, _>>()
    })?;

    let first = ids.first().copied();
    assert!(ids.iter().all(|id| Some(*id) == first));
    assert_eq!(entities.select_tasks_by_job_id(job.id())?.len(), 1);
    Ok(())
}
