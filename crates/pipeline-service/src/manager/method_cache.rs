//! Memoization of expensive manager methods.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use pipeline_core::result::AppResult;
use pipeline_core::traits::CacheProvider;

use pipeline_cache::{CacheManager, keys};

/// Caches method results under `method:{owner}:{method}:{hash}`, where the
/// hash covers the method name and its arguments.
#[derive(Debug, Clone)]
pub struct MethodCache {
    cache: CacheManager,
    owner: String,
    ttl: Duration,
}

impl MethodCache {
    pub fn new(cache: CacheManager, owner: impl Into<String>, ttl: Duration) -> Self {
        Self {
            cache,
            owner: owner.into(),
            ttl,
        }
    }

    pub fn key(&self, method: &str, args: &Value, kwargs: &Value) -> String {
        keys::method(&self.owner, method, args, kwargs)
    }

    /// Return the cached result of `method(args, kwargs)` or run `compute`
    /// and cache what it returns. Errors from `compute` are not cached.
    pub async fn memoize<T, F, Fut>(
        &self,
        method: &str,
        args: &Value,
        kwargs: &Value,
        ttl: Option<Duration>,
        compute: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let key = self.key(method, args, kwargs);
        if let Some(raw) = super::read_cache(&self.cache, &key).await {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => debug!(key = %key, error = %e, "Ignoring undecodable method result"),
            }
        }

        let value = compute().await?;
        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, &raw, ttl.unwrap_or(self.ttl)).await {
                    debug!(key = %key, error = %e, "Cache write failed");
                }
            }
            Err(e) => debug!(key = %key, error = %e, "Method result is not serializable"),
        }
        Ok(value)
    }

    /// Forget one memoized result.
    pub async fn forget(&self, method: &str, args: &Value, kwargs: &Value) -> AppResult<()> {
        self.cache.delete(&self.key(method, args, kwargs)).await
    }
}
