//! Flowstore: persistence and coordination backend for workflow engines.
//!
//! Flowstore stores workflows, jobs and tasks in a flat key-value namespace
//! and coordinates the workers that execute them: tasks are materialized at
//! most once per identity and payload, and each task carries a time-bounded
//! lease so only one worker runs it at a time.
//!
//! # Architecture
//!
//! Flowstore follows hexagonal architecture principles:
//!
//! - **Domain**: Plain snapshots of workflows, jobs, tasks and leases
//! - **Ports**: The abstract key-value operation set the services consume
//! - **Adapters**: In-memory and `PostgreSQL` implementations of that port
//!
//! # Modules
//!
//! - [`config`]: Explicit store configuration and validation
//! - [`kv`]: Key-value port, key patterns and adapters
//! - [`workflow`]: Entity store, task deduplication and task leases
//!
//! The library logs through `tracing`; installing a subscriber is left to
//! the host process.

pub mod config;
pub mod kv;
pub mod workflow;
