//! Opening a store from process environment configuration.

use std::sync::Arc;

use crate::test_helpers::{ManualClock, with_store_env};
use eyre::Result;
use flowstore::config::{BackendConfig, ConfigError, StoreConfig};
use flowstore::workflow::services::{StoreError, WorkflowStore};
use rstest::rstest;
use serde_json::json;

#[rstest]
fn store_opens_from_environment_namespace() -> Result<()> {
    let config = with_store_env(
        &[("FLOWSTORE_NAMESPACE", "env-ns"), ("FLOWSTORE_BACKEND", "memory")],
        StoreConfig::from_env,
    )?;
    assert!(matches!(config.backend, BackendConfig::Memory));

    let store = WorkflowStore::open(&config, Arc::new(ManualClock::frozen()))?;
    assert_eq!(store.entities().keys().namespace(), "env-ns");

    let workflow = store.entities().persist_workflow("etl", json!({}))?;
    assert_eq!(
        store.entities().find_workflow_by_name("etl")?,
        Some(workflow)
    );
    Ok(())
}

#[rstest]
fn unknown_backend_in_environment_is_rejected() {
    let result = with_store_env(&[("FLOWSTORE_BACKEND", "redis")], StoreConfig::from_env);

    assert!(matches!(result, Err(ConfigError::InvalidVar { .. })));
}

#[rstest]
fn empty_environment_defaults_to_memory_backend() -> Result<()> {
    let config = with_store_env(&[], StoreConfig::from_env)?;

    assert_eq!(config.namespace, "flowstore");
    assert!(matches!(config.backend, BackendConfig::Memory));
    Ok(())
}

#[rstest]
fn invalid_config_is_rejected_at_open() {
    let config = StoreConfig::in_memory("bad:namespace");

    let result = WorkflowStore::open(&config, Arc::new(ManualClock::frozen()));

    assert!(matches!(result, Err(StoreError::Config(ConfigError::Invalid(_)))));
}
