use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Configuration not found: {0}")]
    NotFound(String),

    #[error("Configuration already exists: {0}")]
    AlreadyExists(String),

    #[error("Version conflict on {id}: version {version} was claimed by a concurrent writer")]
    VersionConflict { id: Uuid, version: u64 },

    #[error("Object store failure: {0}")]
    Backend(#[from] object_store::Error),

    #[error("Malformed stored document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store call exceeded its deadline of {0:?}")]
    Timeout(Duration),

    #[error("Store unit of work was interrupted: {0}")]
    Interrupted(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
