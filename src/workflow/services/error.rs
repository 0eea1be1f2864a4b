//! Service-level errors for workflow, job and task operations.

use crate::config::ConfigError;
use crate::kv::ports::KeyValueStoreError;
use crate::workflow::{domain::TaskId, keys::KeyError, serializer::SerializerError};
use thiserror::Error;

/// Errors returned by the workflow store services.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A workflow with this name already exists.
    #[error("workflow name '{0}' is already in use")]
    DuplicateName(String),

    /// No task has this identifier.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// A stored record cannot be decoded.
    #[error("corrupt record at '{key}': {reason}")]
    CorruptRecord {
        /// Key of the malformed record.
        key: String,
        /// Decoding failure description.
        reason: String,
    },

    /// A key could not be built or parsed.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// A value could not be encoded for storage.
    #[error(transparent)]
    Serialization(#[from] SerializerError),

    /// The store configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backing key-value store failed.
    #[error(transparent)]
    Backend(#[from] KeyValueStoreError),
}

impl StoreError {
    /// Builds a [`StoreError::CorruptRecord`] for `key`.
    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for workflow store service operations.
pub type StoreResult<T> = Result<T, StoreError>;
