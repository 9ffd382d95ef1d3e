use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_types::ConfigKey;
use uuid::Uuid;

/// Ownership marker for a `ConfigKey`, stored at `keys/{app}/{namespace}/{key}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyClaim {
    pub id: Uuid,
}

/// Left behind when an item is deleted so its history stays readable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tombstone {
    pub id: Uuid,
    #[serde(flatten)]
    pub config_key: ConfigKey,
    /// Last committed version before deletion
    pub version: u64,
    pub deleted_at: DateTime<Utc>,
}

impl Tombstone {
    pub fn new(id: Uuid, config_key: ConfigKey, version: u64) -> Self {
        Self {
            id,
            config_key,
            version,
            deleted_at: Utc::now(),
        }
    }
}
