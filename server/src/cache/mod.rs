//! Read-through cache of resolved pulls.
//!
//! The cache is a disposable projection of the store: every entry can be
//! rebuilt from the store and the gray rules, and nothing treats a hit as
//! more authoritative than a store read.

mod keys;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use shared_types::ConfigKey;
use thiserror::Error;

pub use keys::{context_fingerprint, scoped_key};
pub use memory::{DEFAULT_CAPACITY, MokaCache};

/// Lifetime of a resolved pull in the cache
pub const RESOLVED_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache invalidation rejected: {0}")]
    Invalidation(String),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// Hit/miss counters since the cache was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

#[async_trait]
pub trait ConfigCache: Send + Sync {
    /// A miss is `Ok(None)`, never an error.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
    /// Drops every cached resolution of `key`, whichever client context produced it.
    async fn invalidate(&self, key: &ConfigKey) -> Result<(), CacheError>;
    fn stats(&self) -> CacheStats;
}
