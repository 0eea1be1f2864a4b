//! Entity persistence and deduplication against `PostgreSQL`.

use super::helpers::setup_store;
use eyre::{Result, eyre};
use flowstore::workflow::domain::{NewTask, SortOrder};
use flowstore::workflow::services::StoreError;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[ignore = "requires FLOWSTORE_TEST_DATABASE_URL"]
fn workflow_round_trips_and_name_is_unique() -> Result<()> {
    let context = setup_store()?;
    let entities = context.store.entities();
    let descriptor = json!({"steps": [{"name": "extract"}, {"name": "load"}]});

    let workflow = entities.persist_workflow("etl", descriptor.clone())?;
    let found = entities
        .find_workflow(workflow.id())?
        .ok_or_else(|| eyre!("workflow should exist"))?;
    assert_eq!(found.descriptor(), &descriptor);
    assert!(matches!(
        entities.persist_workflow("etl", json!({})),
        Err(StoreError::DuplicateName(_))
    ));

    assert!(entities.delete_workflow(workflow.id())?);
    let replacement = entities.persist_workflow("etl", json!({}))?;
    assert_ne!(replacement.id(), workflow.id());
    Ok(())
}

#[rstest]
#[ignore = "requires FLOWSTORE_TEST_DATABASE_URL"]
fn jobs_page_in_creation_order() -> Result<()> {
    let context = setup_store()?;
    let entities = context.store.entities();
    let workflow = entities.persist_workflow("batch", json!({}))?;
    let mut created = Vec::new();
    for index in 0..4 {
        created.push(entities.persist_job(&workflow, json!({"index": index}))?);
        context.clock.advance(chrono::TimeDelta::seconds(1));
    }

    let page = entities.select_jobs(2, 1, SortOrder::Ascending)?;
    assert_eq!(page, created.get(1..3).unwrap_or_default().to_vec());
    let newest = entities.select_jobs(1, 0, SortOrder::Descending)?;
    assert_eq!(newest.first(), created.last());
    assert_eq!(entities.count_jobs()?, 4);
    Ok(())
}

#[rstest]
#[ignore = "requires FLOWSTORE_TEST_DATABASE_URL"]
fn equivalent_task_requests_share_one_record() -> Result<()> {
    let context = setup_store()?;
    let entities = context.store.entities();
    let resolver = context.store.deduplication();
    let workflow = entities.persist_workflow("dedup", json!({}))?;
    let job = entities.persist_job(&workflow, json!({}))?;

    let first = resolver.find_or_persist_task(NewTask::new(
        "t",
        "q",
        json!({"a": 1, "b": 2}),
        job.id(),
    ))?;
    let second = resolver.find_or_persist_task(NewTask::new(
        "t",
        "q",
        json!({"b": 2, "a": 1}),
        job.id(),
    ))?;
    let other = resolver.find_or_persist_task(NewTask::new(
        "t",
        "q",
        json!({"a": 2}),
        job.id(),
    ))?;

    assert_eq!(first, second);
    assert_ne!(first, other);
    assert_eq!(entities.select_tasks_by_job_id(job.id())?.len(), 2);
    Ok(())
}
