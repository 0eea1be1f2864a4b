//! Full lifecycle of a workflow, its job and a leased task.

use super::helpers::{Context, context};
use chrono::TimeDelta;
use eyre::{Result, eyre};
use flowstore::workflow::domain::{NewTask, SortOrder};
use mockable::Clock;
use rstest::rstest;
use serde_json::json;

#[rstest]
fn workflow_job_task_lease_lifecycle(context: Context) -> Result<()> {
    let entities = context.store.entities();
    let workflow = entities.persist_workflow("W", json!({"tasks": ["t"]}))?;
    let job = entities.persist_job(&workflow, json!({"input": 42}))?;

    let request = NewTask::new("t", "q", json!({"x": 1}), job.id());
    let first = context
        .store
        .deduplication()
        .find_or_persist_task(request.clone())?;
    let second = context.store.deduplication().find_or_persist_task(request)?;
    assert_eq!(first, second);
    assert_eq!(entities.select_tasks_by_job_id(job.id())?.len(), 1);

    let leases = context.store.leases();
    let started = context.clock.utc();
    let lease = leases
        .lock(first, 60)?
        .ok_or_else(|| eyre!("fresh task should be lockable"))?;
    assert_eq!(lease.expires_at(), started + TimeDelta::seconds(60));
    assert!(leases.lock(first, 60)?.is_none());

    context.clock.advance(TimeDelta::seconds(20));
    let extended = leases
        .renew(first, 60, lease.token())?
        .ok_or_else(|| eyre!("holder should renew"))?;
    assert!(extended > lease.expires_at());

    assert!(leases.unlock(first, lease.token())?);
    assert!(entities.update_status(first, "completed")?);

    let task = entities
        .find_task(first)?
        .ok_or_else(|| eyre!("task should exist"))?;
    assert_eq!(task.status(), Some("completed"));
    assert!(task.locked_by().is_none());

    let jobs = entities.select_jobs(10, 0, SortOrder::Ascending)?;
    assert_eq!(jobs, vec![job]);
    Ok(())
}

#[rstest]
fn task_forest_is_navigable_by_parent(context: Context) -> Result<()> {
    let entities = context.store.entities();
    let resolver = context.store.deduplication();
    let workflow = entities.persist_workflow("fan-out", json!({}))?;
    let job = entities.persist_job(&workflow, json!({}))?;

    let root = resolver.find_or_persist_task(NewTask::new("split", "q", json!({}), job.id()))?;
    let mut children = Vec::new();
    for shard in 0..3 {
        children.push(resolver.find_or_persist_task(
            NewTask::new("work", "q", json!({"shard": shard}), job.id()).with_parent(root),
        )?);
    }
    let grandchild = resolver.find_or_persist_task(
        NewTask::new("work", "q", json!({"shard": 0}), job.id())
            .with_parent(*children.first().ok_or_else(|| eyre!("children exist"))?),
    )?;

    let under_root =
        entities.find_task_ids_by_job_id_name_and_parent_task_ids(job.id(), "work", &[root])?;
    assert_eq!(under_root.len(), 3);
    assert!(!under_root.contains(&grandchild));

    let all_work = entities.find_task_ids_by_job_id_and_name(job.id(), "work")?;
    assert_eq!(all_work.len(), 4);
    Ok(())
}
