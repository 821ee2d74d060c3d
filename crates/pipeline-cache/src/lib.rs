//! # pipeline-cache
//!
//! Cache provider implementations for the pipeline workspace. Supports two
//! modes:
//!
//! - **memory**: In-process cache using [moka](https://crates.io/crates/moka)
//! - **redis**: Redis-backed cache using the [redis](https://crates.io/crates/redis) crate
//!
//! The provider is selected at runtime based on configuration. On top of the
//! providers sit the deterministic key builders ([`keys`]) and the
//! fail-open [`ModelCache`].

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod model_cache;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use keys::CacheKeyBuilder;
pub use model_cache::ModelCache;
pub use provider::CacheManager;
