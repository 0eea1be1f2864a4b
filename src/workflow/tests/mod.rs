//! Unit tests for the workflow module.
//!
//! Tests are organised by service, running against the in-memory adapter
//! with a manually driven clock. Backend failures and lost races use a
//! mocked key-value store.

mod support;
