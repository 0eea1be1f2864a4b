//! `PostgreSQL` integration tests for the workflow store.
//!
//! These tests need a reachable database named by
//! `FLOWSTORE_TEST_DATABASE_URL` and are ignored by default. Each test writes
//! under its own namespace, so runs can share one database.
//!
//! Tests are organized into modules by functionality:
//! - `helpers`: Schema setup and store construction
//! - `store_tests`: Entity persistence and deduplication
//! - `lease_tests`: Lock, renew and unlock across connections

mod test_helpers;

mod postgres {
    pub mod helpers;

    mod lease_tests;
    mod store_tests;
}
