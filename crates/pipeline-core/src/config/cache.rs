//! Cache provider configuration and cache timeouts.

use serde::{Deserialize, Serialize};

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache provider type: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Default TTL for entries written without an explicit TTL.
    #[serde(default = "default_ttl")]
    pub default_ttl_seconds: u64,
    /// Per-layer timeouts.
    #[serde(default)]
    pub timeouts: CacheTimeouts,
    /// Redis-specific cache configuration.
    #[serde(default)]
    pub redis: RedisCacheConfig,
    /// In-memory cache configuration.
    #[serde(default)]
    pub memory: MemoryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            default_ttl_seconds: default_ttl(),
            timeouts: CacheTimeouts::default(),
            redis: RedisCacheConfig::default(),
            memory: MemoryCacheConfig::default(),
        }
    }
}

/// Timeouts used by the cache-aware layers, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheTimeouts {
    /// Model cache (`get_cached`/`set_cached`) entries.
    #[serde(default = "default_hour")]
    pub model_ttl_seconds: u64,
    /// Cached manager lookups and filters.
    #[serde(default = "default_hour")]
    pub manager_ttl_seconds: u64,
    /// Token validation results and token-scoped lookups.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    /// Search result pages.
    #[serde(default = "default_search_ttl")]
    pub search_ttl_seconds: u64,
    /// Memoized method results.
    #[serde(default = "default_hour")]
    pub method_ttl_seconds: u64,
}

impl Default for CacheTimeouts {
    fn default() -> Self {
        Self {
            model_ttl_seconds: default_hour(),
            manager_ttl_seconds: default_hour(),
            token_ttl_seconds: default_token_ttl(),
            search_ttl_seconds: default_search_ttl(),
            method_ttl_seconds: default_hour(),
        }
    }
}

/// Redis cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Key prefix prepended to every cache key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// In-memory cache backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryCacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_ttl() -> u64 {
    300
}

fn default_hour() -> u64 {
    3600
}

fn default_token_ttl() -> u64 {
    300
}

fn default_search_ttl() -> u64 {
    900
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "pipeline:".to_string()
}

fn default_max_capacity() -> u64 {
    10_000
}
