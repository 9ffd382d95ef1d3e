use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use shared_types::ConfigKey;
use tracing::debug;

use super::keys::SCOPE_SEPARATOR;
use super::{CacheError, CacheStats, ConfigCache};

pub const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Clone)]
struct CachedPayload {
    body: String,
    ttl: Duration,
}

/// Expires every entry after the ttl it was stored with
struct PayloadExpiry;

impl Expiry<String, CachedPayload> for PayloadExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedPayload,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedPayload,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process `ConfigCache` backed by moka
pub struct MokaCache {
    entries: Cache<String, CachedPayload>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MokaCache {
    pub fn new(max_capacity: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PayloadExpiry)
            .support_invalidation_closures()
            .build();

        Self {
            entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl ConfigCache for MokaCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.entries.get(key) {
            Some(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(payload.body))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), CachedPayload { body: value, ttl });
        Ok(())
    }

    async fn invalidate(&self, key: &ConfigKey) -> Result<(), CacheError> {
        let base = key.cache_key();
        self.entries.invalidate(&base);

        let scope_prefix = format!("{base}{SCOPE_SEPARATOR}");
        self.entries
            .invalidate_entries_if(move |k, _| k.starts_with(&scope_prefix))
            .map_err(|e| CacheError::Invalidation(e.to_string()))?;

        debug!(%key, "Invalidated cached resolutions");
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.entry_count(),
        }
    }
}
