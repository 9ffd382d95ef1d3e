use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_types::{
    ConfigItem, ConfigKey, CreateConfigRequest, GrayRules, ListFilter, Pagination,
    UpdateConfigRequest, VersionRecord,
};
use uuid::Uuid;

use super::error::StorageResult;

/// Mutable fields of an item, as supplied by a create or update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub value: String,
    pub description: String,
    pub is_active: bool,
    pub gray_release: bool,
    pub gray_rules: Option<GrayRules>,
}

impl ItemDraft {
    pub fn into_item(
        self,
        id: Uuid,
        config_key: ConfigKey,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> ConfigItem {
        ConfigItem {
            id,
            config_key,
            value: self.value,
            description: self.description,
            version,
            is_active: self.is_active,
            gray_release: self.gray_release,
            gray_rules: self.gray_rules,
            created_at,
            updated_at,
        }
    }
}

impl From<CreateConfigRequest> for ItemDraft {
    fn from(request: CreateConfigRequest) -> Self {
        Self {
            value: request.value,
            description: request.description,
            is_active: request.is_active,
            gray_release: request.gray_release,
            gray_rules: request.gray_rules,
        }
    }
}

impl From<UpdateConfigRequest> for ItemDraft {
    fn from(request: UpdateConfigRequest) -> Self {
        Self {
            value: request.value,
            description: request.description,
            is_active: request.is_active,
            gray_release: request.gray_release,
            gray_rules: request.gray_rules,
        }
    }
}

/// Durable item state plus its append-only version ledger.
///
/// `create` and `update` append exactly one `VersionRecord` in the same unit
/// of work as the item change; neither is visible without the other.
#[async_trait]
pub trait ConfigStorage: Send + Sync {
    async fn create(&self, key: &ConfigKey, draft: ItemDraft) -> StorageResult<ConfigItem>;
    async fn update(&self, id: Uuid, draft: ItemDraft) -> StorageResult<ConfigItem>;
    /// Removes the live item and returns its key; history is kept.
    async fn delete(&self, id: Uuid) -> StorageResult<ConfigKey>;
    async fn get(&self, id: Uuid) -> StorageResult<ConfigItem>;
    async fn get_active_by_key(&self, key: &ConfigKey) -> StorageResult<ConfigItem>;
    /// Newest first, ties broken by descending id.
    async fn list(&self, filter: &ListFilter, page: Pagination) -> StorageResult<Vec<ConfigItem>>;
    /// Committed versions of an item, highest first.
    async fn history(&self, id: Uuid) -> StorageResult<Vec<VersionRecord>>;
}
