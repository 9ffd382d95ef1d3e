use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::DEFAULT_CAPACITY;
use crate::service::DEFAULT_STORE_TIMEOUT;
use crate::storage::StorageConfig;

/// Process configuration, read once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_address: SocketAddr,
    pub storage: StorageConfig,
    pub cache_max_capacity: u64,
    pub store_timeout: Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let bind_address = std::env::var("BIND_ADDRESS")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDRESS must be a socket address")?;

        let cache_max_capacity = match std::env::var("CACHE_MAX_CAPACITY") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("CACHE_MAX_CAPACITY is not a number: {raw}"))?,
            Err(_) => DEFAULT_CAPACITY,
        };

        let store_timeout = match std::env::var("STORE_TIMEOUT_MS") {
            Ok(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("STORE_TIMEOUT_MS is not a number: {raw}"))?,
            ),
            Err(_) => DEFAULT_STORE_TIMEOUT,
        };

        Ok(Self {
            bind_address,
            storage: StorageConfig::from_env()?,
            cache_max_capacity,
            store_timeout,
        })
    }
}
