use std::sync::Arc;
use std::time::Duration;

use shared_types::{ClientContext, ConfigItem, ConfigKey, ResolvedConfig, Variant};
use tracing::{debug, instrument, warn};

use super::{DEFAULT_STORE_TIMEOUT, ServiceError, read_within};
use crate::cache::{ConfigCache, RESOLVED_TTL, scoped_key};
use crate::gray::{GrayRuleEvaluator, Resolution};
use crate::storage::ConfigStorage;

/// Read path used by application instances
#[derive(Clone)]
pub struct PullService {
    storage: Arc<dyn ConfigStorage>,
    cache: Arc<dyn ConfigCache>,
    store_timeout: Duration,
}

impl PullService {
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

    /// Serve the active value for `key`, the gray variant if `context` is selected.
    #[instrument(skip(self, key, context), fields(%key))]
    pub async fn pull(
        &self,
        key: &ConfigKey,
        context: Option<&ClientContext>,
    ) -> Result<ResolvedConfig, ServiceError> {
        let key = &key.trimmed();
        if !key.is_complete() {
            return Err(ServiceError::Validation(
                "Missing required parameters: app_id, namespace and key".to_string(),
            ));
        }

        let cache_key = scoped_key(key, context);
        match self.cache.get(&cache_key).await {
            Ok(Some(payload)) => match serde_json::from_str::<ResolvedConfig>(&payload) {
                Ok(resolved) => {
                    debug!(%cache_key, "Cache hit");
                    return Ok(resolved);
                }
                Err(e) => warn!(%cache_key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => debug!(%cache_key, "Cache miss"),
            Err(e) => warn!(%cache_key, error = %e, "Cache read failed, reading store"),
        }

        let item = read_within(self.store_timeout, self.storage.get_active_by_key(key)).await?;
        let resolved = resolve(item, context);

        match serde_json::to_string(&resolved) {
            Ok(payload) => {
                if let Err(e) = self.cache.set(&cache_key, payload, RESOLVED_TTL).await {
                    warn!(%cache_key, error = %e, "Failed to populate cache");
                }
            }
            Err(e) => warn!(%cache_key, error = %e, "Failed to serialize resolved config"),
        }

        Ok(resolved)
    }
}

/// Choose between the canonical value and the gray variant
fn resolve(mut item: ConfigItem, context: Option<&ClientContext>) -> ResolvedConfig {
    let gray_value = match (&item.gray_rules, item.gray_release) {
        (Some(rules), true) => match GrayRuleEvaluator::evaluate(rules, context) {
            Resolution::Gray(kind) => {
                debug!(key = %item.config_key, ?kind, "Serving gray variant");
                Some(rules.value.clone())
            }
            Resolution::Canonical => None,
        },
        _ => None,
    };

    let variant = match gray_value {
        Some(value) => {
            item.value = value;
            Variant::Gray
        }
        None => Variant::Canonical,
    };

    ResolvedConfig { item, variant }
}
