//! Workflow, job and task persistence with task deduplication and leases.
//!
//! Workflows are named process templates, jobs are running instances that
//! snapshot their workflow, and tasks are units of work materialized from a
//! job, optionally nested under a parent task. Entities live in the flat
//! key namespace of a [`crate::kv::ports::KeyValueStore`]; their
//! relationships are encoded in the keys so lookups become pattern scans.
//!
//! - Domain types in [`domain`]
//! - Key layout in [`keys`]
//! - Stored value encoding in [`serializer`]
//! - Orchestration services in [`services`]

pub mod domain;
pub mod keys;
pub mod serializer;
pub mod services;

#[cfg(test)]
mod tests;
