//! Abstract key-value storage used by the workflow store.
//!
//! The coordination core never talks to a database directly. It consumes the
//! [`ports::KeyValueStore`] operation set: field-level upserts and reads of a
//! single record, pattern enumeration of keys, deletion, and two single-key
//! conditional writes. Each operation is atomic on its key; nothing spans
//! keys.
//!
//! - Value types in [`domain`]
//! - Port contract in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;
