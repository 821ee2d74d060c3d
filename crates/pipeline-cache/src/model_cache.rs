//! Fail-open model cache.
//!
//! Every operation here swallows backend failures: a cache that cannot be
//! read behaves like a miss and a cache that cannot be written reports
//! `false`. Callers never see a cache error.

use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use pipeline_core::result::AppResult;
use pipeline_core::traits::cache::CacheProvider;
use pipeline_core::traits::entity::Entity;
use pipeline_core::types::record::value_to_string;

use crate::keys::CacheKeyBuilder;
use crate::provider::CacheManager;

/// Cache type used for single-entity entries.
pub const DETAIL: &str = "detail";

/// Read-through helpers keyed by `model_cache:{model}:...`.
#[derive(Debug, Clone)]
pub struct ModelCache<E: Entity> {
    cache: CacheManager,
    keys: CacheKeyBuilder,
    ttl: Duration,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> ModelCache<E> {
    pub fn new(cache: CacheManager, ttl: Duration) -> Self {
        Self {
            cache,
            keys: CacheKeyBuilder::model::<E>(),
            ttl,
            _entity: PhantomData,
        }
    }

    pub fn keys(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Read an entry. Misses, backend failures and undecodable values all
    /// yield `None`.
    pub async fn get_cached<T: DeserializeOwned>(
        &self,
        identifier: Option<&str>,
        cache_type: &str,
        params: Option<&Value>,
    ) -> Option<T> {
        let key = self.keys.key(cache_type, identifier, params);
        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write an entry with `ttl` or the model default. Returns `false` on
    /// any failure.
    pub async fn set_cached<T: Serialize>(
        &self,
        identifier: Option<&str>,
        data: &T,
        cache_type: &str,
        params: Option<&Value>,
        ttl: Option<Duration>,
    ) -> bool {
        let key = self.keys.key(cache_type, identifier, params);
        let written: AppResult<()> = async {
            let raw = serde_json::to_string(data)?;
            self.cache.set(&key, &raw, ttl.unwrap_or(self.ttl)).await
        }
        .await;
        match written {
            Ok(()) => true,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Remove an entry. Returns `false` when the backend failed.
    pub async fn delete_cached(
        &self,
        identifier: Option<&str>,
        cache_type: &str,
        params: Option<&Value>,
    ) -> bool {
        let key = self.keys.key(cache_type, identifier, params);
        match self.cache.delete(&key).await {
            Ok(()) => true,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache delete failed");
                false
            }
        }
    }

    /// Drop every entry of this model. Returns the number of removed keys,
    /// zero when the backend failed.
    pub async fn invalidate_model(&self) -> u64 {
        let pattern = self.keys.model_pattern();
        match self.cache.delete_pattern(&pattern).await {
            Ok(count) => count,
            Err(e) => {
                debug!(pattern = %pattern, error = %e, "Cache pattern delete failed");
                0
            }
        }
    }

    /// Cache an entity's detail entry under its primary key.
    ///
    /// The stored value is the entity record plus `_model`, `_id` and
    /// `_str`.
    pub async fn cache_entity(&self, entity: &E) -> bool {
        let Ok((id, mut record)) = entity
            .pk_value()
            .and_then(|pk| Ok((pk, entity.to_record()?)))
        else {
            return false;
        };
        record.insert("_model".into(), Value::String(E::MODEL_NAME.into()));
        record.insert("_str".into(), Value::String(entity.display()));
        record.insert("_id".into(), id.clone());
        self.set_cached(Some(&value_to_string(&id)), &record, DETAIL, None, None)
            .await
    }

    /// Read an entity's detail entry back.
    pub async fn get_cached_entity(&self, pk: &Value) -> Option<E> {
        let record: pipeline_core::types::record::Record =
            self.get_cached(Some(&value_to_string(pk)), DETAIL, None).await?;
        E::from_record(record).ok()
    }

    /// Remove an entity's detail entry.
    pub async fn invalidate_entity(&self, entity: &E) -> bool {
        match entity.pk_value() {
            Ok(pk) => self.delete_cached(Some(&value_to_string(&pk)), DETAIL, None).await,
            Err(_) => false,
        }
    }
}
