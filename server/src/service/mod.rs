//! Read and write orchestration over the store, the cache and the gray rules.

mod error;
mod mutation;
mod pull;


use std::future::Future;
use std::time::Duration;

use shared_types::{ConfigKey, GrayRules};
use tracing::warn;

use crate::cache::ConfigCache;
use crate::gray::GrayRuleEvaluator;
use crate::storage::{StorageError, StorageResult};

pub use error::ServiceError;
pub use mutation::MutationService;
pub use pull::PullService;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Bounds a store read by the request deadline.
async fn read_within<T>(
    limit: Duration,
    op: impl Future<Output = StorageResult<T>>,
) -> Result<T, ServiceError> {
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(ServiceError::from),
        Err(_) => Err(StorageError::Timeout(limit).into()),
    }
}

/// Runs a mutation unit on its own task and waits for it up to `limit`.
///
/// The unit always runs to completion, including its post-commit cache
/// invalidation, even when the caller stops waiting. Dropping it midway
/// would leave an uncommitted ledger record behind.
async fn commit_detached<T: Send + 'static>(
    limit: Duration,
    unit: impl Future<Output = StorageResult<T>> + Send + 'static,
) -> Result<T, ServiceError> {
    let handle = tokio::spawn(unit);
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result.map_err(ServiceError::from),
        Ok(Err(join_err)) => Err(StorageError::Interrupted(join_err.to_string()).into()),
        Err(_) => Err(StorageError::Timeout(limit).into()),
    }
}

/// Post-commit step. A failure here is logged and left to the TTL.
async fn invalidate_after_commit(cache: &dyn ConfigCache, key: &ConfigKey) {
    if let Err(e) = cache.invalidate(key).await {
        warn!(%key, error = %e, "Cache invalidation failed; entry will expire by TTL");
    }
}

fn validate_gray(gray_rules: Option<&GrayRules>) -> Result<(), ServiceError> {
    gray_rules.map_or(Ok(()), |rules| {
        GrayRuleEvaluator::validate(rules).map_err(ServiceError::Validation)
    })
}
