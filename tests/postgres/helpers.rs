//! Shared test helpers for `PostgreSQL` integration tests.

use std::sync::{Arc, OnceLock};

use crate::test_helpers::ManualClock;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use eyre::{Result, WrapErr, eyre};
use flowstore::config::{PostgresConfig, StoreConfig};
use flowstore::kv::ports::KeyValueStore;
use flowstore::workflow::services::WorkflowStore;
use uuid::Uuid;

/// Variable naming the database used by these tests.
pub const DATABASE_URL_VAR: &str = "FLOWSTORE_TEST_DATABASE_URL";

/// SQL creating the key-value table.
pub const CREATE_SCHEMA_SQL: &str =
    include_str!("../../migrations/2026-10-15-000000_create_kv_records/up.sql");

static SCHEMA: OnceLock<Result<(), String>> = OnceLock::new();

/// Workflow store over the `PostgreSQL` adapter with a manual clock.
pub type PgStore = WorkflowStore<dyn KeyValueStore, ManualClock>;

/// Store under test together with its clock.
pub struct PgContext {
    /// Clock driving lease expiry.
    pub clock: Arc<ManualClock>,
    /// Services under test.
    pub store: PgStore,
}

/// Connects to the test database and returns a store in a fresh namespace.
///
/// # Errors
///
/// Returns an error if the database variable is unset, the schema cannot be
/// applied, or the pool cannot be built.
pub fn setup_store() -> Result<PgContext> {
    let url = std::env::var(DATABASE_URL_VAR)
        .wrap_err_with(|| format!("{DATABASE_URL_VAR} must name a test database"))?;
    ensure_schema(&url)?;

    let namespace = format!("it{}", Uuid::new_v4().simple());
    let config = StoreConfig::postgres(PostgresConfig::from_url(url)).with_namespace(namespace);
    let clock = Arc::new(ManualClock::frozen());
    let store = WorkflowStore::open(&config, Arc::clone(&clock))?;
    Ok(PgContext { clock, store })
}

/// Applies the schema once per test process.
fn ensure_schema(url: &str) -> Result<()> {
    SCHEMA
        .get_or_init(|| apply_schema(url).map_err(|err| format!("{err:#}")))
        .clone()
        .map_err(|message| eyre!(message))
}

fn apply_schema(url: &str) -> Result<()> {
    let mut conn = PgConnection::establish(url).wrap_err("connect to test database")?;
    let idempotent = CREATE_SCHEMA_SQL
        .replace("CREATE TABLE", "CREATE TABLE IF NOT EXISTS")
        .replace("CREATE INDEX", "CREATE INDEX IF NOT EXISTS");
    conn.batch_execute(&idempotent)
        .wrap_err("apply kv_records schema")?;
    Ok(())
}
