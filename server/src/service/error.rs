use thiserror::Error;

use crate::storage::StorageError;

/// Failures surfaced to callers of the services.
///
/// `Validation`, `NotFound` and `Conflict` carry caller-facing messages;
/// `Store` is an internal fault. Cache faults never surface here: reads fall
/// back to the store and writes are left to the TTL.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Storage failure: {0}")]
    Store(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(format!("Configuration not found: {what}")),
            StorageError::AlreadyExists(key) => {
                Self::Conflict(format!("Configuration already exists: {key}"))
            }
            err @ StorageError::VersionConflict { .. } => Self::Conflict(err.to_string()),
            other => Self::Store(other),
        }
    }
}
