//! Managers: store lookups, read-through caching and token-gated access.

pub mod base;
pub mod cached;
pub mod method_cache;
pub mod token;

pub use base::{BaseManager, BulkCounts};
pub use cached::CachedManager;
pub use method_cache::MethodCache;
pub use token::{TokenAwareManager, TokenCachedManager, TokenScope};

use serde_json::Value;
use tracing::debug;

use pipeline_core::traits::{CacheProvider, Entity};
use pipeline_core::types::Record;

use pipeline_cache::CacheManager;

/// Decode a cached entity record, dropping the entry when it no longer
/// fits the entity.
pub(crate) async fn decode_cached<E: Entity>(
    cache: &CacheManager,
    key: &str,
    raw: &str,
) -> Option<Option<E>> {
    let decoded = serde_json::from_str::<Option<Record>>(raw)
        .map_err(|e| e.to_string())
        .and_then(|record| record.map(E::from_record).transpose().map_err(|e| e.message));
    match decoded {
        Ok(entity) => Some(entity),
        Err(e) => {
            debug!(key = %key, error = %e, "Dropping stale cache entry");
            if let Err(e) = cache.delete(key).await {
                debug!(key = %key, error = %e, "Cache delete failed");
            }
            None
        }
    }
}

/// Cache read that treats backend failures as misses.
pub(crate) async fn read_cache(cache: &CacheManager, key: &str) -> Option<String> {
    match cache.get(key).await {
        Ok(raw) => raw,
        Err(e) => {
            debug!(key = %key, error = %e, "Cache read failed, treating as miss");
            None
        }
    }
}

/// Cache write that only logs failures.
pub(crate) async fn write_cache(
    cache: &CacheManager,
    key: &str,
    value: &Value,
    ttl: std::time::Duration,
) {
    if let Err(e) = cache.set(key, &value.to_string(), ttl).await {
        debug!(key = %key, error = %e, "Cache write failed");
    }
}
