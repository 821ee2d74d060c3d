//! Read-through cached manager.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use pipeline_core::result::AppResult;
use pipeline_core::traits::{CacheProvider, Entity};
use pipeline_core::types::record::value_to_string;
use pipeline_core::types::{FilterField, Query, Record, SortField};

use pipeline_cache::{CacheKeyBuilder, CacheManager};

use super::base::BaseManager;
use super::method_cache::MethodCache;
use super::{decode_cached, read_cache, write_cache};

/// [`BaseManager`] with cached single-row lookups and cached filters.
///
/// Keys live under `cache_manager:{model}:...`. Concurrent misses for the
/// same key each hit the store.
#[derive(Debug, Clone)]
pub struct CachedManager<E: Entity> {
    base: BaseManager<E>,
    cache: CacheManager,
    keys: CacheKeyBuilder,
    ttl: Duration,
    methods: MethodCache,
}

impl<E: Entity> CachedManager<E> {
    pub fn new(base: BaseManager<E>, cache: CacheManager, ttl: Duration) -> Self {
        Self {
            methods: MethodCache::new(cache.clone(), format!("{}Manager", E::MODEL_NAME), ttl),
            base,
            cache,
            keys: CacheKeyBuilder::manager::<E>(),
            ttl,
        }
    }

    pub fn base(&self) -> &BaseManager<E> {
        &self.base
    }

    pub fn keys(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    fn get_key(&self, identifier: &Value, field: Option<&str>) -> String {
        let params = json!({"field": field, "include_related": false});
        self.keys
            .key("get", Some(&value_to_string(identifier)), Some(&params))
    }

    /// Look a row up by `identifier`, caching the result (including a miss).
    pub async fn get_cached(
        &self,
        identifier: &Value,
        field: Option<&str>,
        force_refresh: bool,
    ) -> AppResult<Option<E>> {
        let key = self.get_key(identifier, field);

        if !force_refresh {
            if let Some(raw) = read_cache(&self.cache, &key).await {
                if let Some(hit) = decode_cached::<E>(&self.cache, &key, &raw).await {
                    debug!(key = %key, "Manager cache hit");
                    return Ok(hit);
                }
            }
        }

        let found = self.base.get_by_field(identifier, field).await?;
        let stored = match &found {
            Some(entity) => Value::Object(entity.to_record()?),
            None => Value::Null,
        };
        write_cache(&self.cache, &key, &stored, self.ttl).await;
        Ok(found)
    }

    /// Rows matching `filters`. The matching primary keys are cached and the
    /// rows are re-read on a hit.
    pub async fn filter_cached(
        &self,
        filters: &Record,
        ordering: &[String],
        force_refresh: bool,
    ) -> AppResult<Vec<E>> {
        let params = json!({"filters": filters, "ordering": ordering});
        let key = self.keys.key("filter", None, Some(&params));

        if !force_refresh {
            if let Some(raw) = read_cache(&self.cache, &key).await {
                match serde_json::from_str::<Vec<Value>>(&raw) {
                    Ok(ids) => return self.fetch_by_pks(ids, ordering).await,
                    Err(e) => {
                        debug!(key = %key, error = %e, "Dropping stale cache entry");
                        let _ = self.cache.delete(&key).await;
                    }
                }
            }
        }

        let rows = self.base.filter_by(filters, &Record::new(), ordering).await?;
        let ids = rows
            .iter()
            .map(Entity::pk_value)
            .collect::<AppResult<Vec<Value>>>()?;
        write_cache(&self.cache, &key, &Value::Array(ids), self.ttl).await;
        Ok(rows)
    }

    pub(crate) async fn fetch_by_pks(
        &self,
        ids: Vec<Value>,
        ordering: &[String],
    ) -> AppResult<Vec<E>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new()
            .filter(FilterField::is_in(E::pk_info().name, ids))
            .order_by(SortField::parse_all(ordering));
        self.base.store().fetch(&query).await
    }

    /// Drop the cached lookups of `entity` and every other entry of the
    /// model. Cache failures are logged and ignored.
    pub async fn invalidate_object_cache(&self, entity: &E) -> AppResult<()> {
        let pk = entity.pk_value()?;
        let pk_name = E::pk_info().name;
        let mut keys = vec![
            self.get_key(&pk, None),
            self.get_key(&pk, Some("pk")),
            self.get_key(&pk, Some(&pk_name)),
        ];
        if let Some(email) = entity.field_value("email")?.as_str() {
            let email = Value::String(email.to_string());
            keys.push(self.get_key(&email, None));
            keys.push(self.get_key(&email, Some("email")));
        }
        for key in &keys {
            if let Err(e) = self.cache.delete(key).await {
                debug!(key = %key, error = %e, "Cache delete failed");
            }
        }
        match self.cache.delete_pattern(&self.keys.model_pattern()).await {
            Ok(count) => debug!(model = %E::MODEL_NAME, count, "Invalidated manager cache"),
            Err(e) => debug!(model = %E::MODEL_NAME, error = %e, "Cache pattern delete failed"),
        }
        Ok(())
    }

    /// Memoize a derived value of this manager under `method`.
    pub async fn cached_method<T, F, Fut>(
        &self,
        method: &str,
        args: &Value,
        ttl: Option<Duration>,
        compute: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        self.methods
            .memoize(method, args, &Value::Object(Record::new()), ttl, compute)
            .await
    }
}
