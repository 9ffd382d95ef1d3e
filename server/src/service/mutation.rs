use std::sync::Arc;
use std::time::Duration;

use shared_types::{
    ConfigItem, CreateConfigRequest, ListFilter, Pagination, UpdateConfigRequest, VersionRecord,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    DEFAULT_STORE_TIMEOUT, ServiceError, commit_detached, invalidate_after_commit, read_within,
    validate_gray,
};
use crate::cache::ConfigCache;
use crate::storage::{ConfigStorage, ItemDraft, StorageError};

/// Write path: one atomic store unit per mutation, then cache invalidation.
#[derive(Clone)]
pub struct MutationService {
    storage: Arc<dyn ConfigStorage>,
    cache: Arc<dyn ConfigCache>,
    store_timeout: Duration,
}

impl MutationService {
    pub fn new(storage: Arc<dyn ConfigStorage>, cache: Arc<dyn ConfigCache>) -> Self {
        Self {
            storage,
            cache,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_store_timeout(mut self, store_timeout: Duration) -> Self {
        self.store_timeout = store_timeout;
        self
    }

    #[instrument(skip(self, request), fields(app_id = %request.app_id, namespace = %request.namespace, key = %request.key))]
    pub async fn create_config(
        &self,
        request: CreateConfigRequest,
    ) -> Result<ConfigItem, ServiceError> {
        let key = request.config_key();
        if !key.is_complete() {
            return Err(ServiceError::Validation(
                "app_id, namespace and key are required".to_string(),
            ));
        }
        validate_gray(request.gray_rules.as_ref())?;

        let storage = Arc::clone(&self.storage);
        let cache = Arc::clone(&self.cache);
        let draft = ItemDraft::from(request);

        let item = commit_detached(self.store_timeout, async move {
            let item = storage.create(&key, draft).await?;
            invalidate_after_commit(cache.as_ref(), &item.config_key).await;
            Ok::<_, StorageError>(item)
        })
        .await?;

        info!(id = %item.id, version = item.version, "Created configuration");
        Ok(item)
    }

    #[instrument(skip(self, request))]
    pub async fn update_config(
        &self,
        id: Uuid,
        request: UpdateConfigRequest,
    ) -> Result<ConfigItem, ServiceError> {
        validate_gray(request.gray_rules.as_ref())?;

        let storage = Arc::clone(&self.storage);
        let cache = Arc::clone(&self.cache);
        let draft = ItemDraft::from(request);

        let item = commit_detached(self.store_timeout, async move {
            let item = storage.update(id, draft).await?;
            invalidate_after_commit(cache.as_ref(), &item.config_key).await;
            Ok::<_, StorageError>(item)
        })
        .await?;

        info!(key = %item.config_key, version = item.version, "Updated configuration");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn delete_config(&self, id: Uuid) -> Result<(), ServiceError> {
        let storage = Arc::clone(&self.storage);
        let cache = Arc::clone(&self.cache);

        let key = commit_detached(self.store_timeout, async move {
            let key = storage.delete(id).await?;
            invalidate_after_commit(cache.as_ref(), &key).await;
            Ok::<_, StorageError>(key)
        })
        .await?;

        info!(%key, "Deleted configuration");
        Ok(())
    }

    pub async fn get_config(&self, id: Uuid) -> Result<ConfigItem, ServiceError> {
        read_within(self.store_timeout, self.storage.get(id)).await
    }

    pub async fn list_configs(
        &self,
        filter: &ListFilter,
        page: Pagination,
    ) -> Result<Vec<ConfigItem>, ServiceError> {
        read_within(self.store_timeout, self.storage.list(filter, page)).await
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<VersionRecord>, ServiceError> {
        read_within(self.store_timeout, self.storage.history(id)).await
    }
}
