//! Token-gated managers.
//!
//! Every read first validates the caller's token for an action through the
//! injected [`TokenValidator`]. Validation results are cached for the token
//! TTL. With `require_ownership`, rows must also belong to the caller as
//! reported by [`HasOwner`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use pipeline_core::result::AppResult;
use pipeline_core::traits::{CacheProvider, Entity, HasOwner, TokenValidation, TokenValidator};
use pipeline_core::types::record::value_to_string;
use pipeline_core::types::{FilterField, Query, Record, SortField};

use pipeline_cache::{CacheKeyBuilder, CacheManager, keys};

use super::base::{BaseManager, filters_for};
use super::{decode_cached, read_cache, write_cache};

/// Who is asking, and for what.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenScope<'a> {
    pub token: &'a str,
    pub action: &'a str,
    pub user_id: Option<&'a str>,
    pub require_ownership: bool,
}

impl<'a> TokenScope<'a> {
    /// Read access with no user pinning and no ownership check.
    pub fn new(token: &'a str) -> Self {
        Self {
            token,
            action: "read",
            user_id: None,
            require_ownership: false,
        }
    }

    pub fn action(mut self, action: &'a str) -> Self {
        self.action = action;
        self
    }

    pub fn user(mut self, user_id: Option<&'a str>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn owned(mut self, require_ownership: bool) -> Self {
        self.require_ownership = require_ownership;
        self
    }
}

/// Manager whose reads require a valid token.
pub struct TokenAwareManager<E: Entity + HasOwner> {
    base: BaseManager<E>,
    validator: Arc<dyn TokenValidator>,
    cache: CacheManager,
    token_ttl: Duration,
}

impl<E: Entity + HasOwner> Clone for TokenAwareManager<E> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            validator: Arc::clone(&self.validator),
            cache: self.cache.clone(),
            token_ttl: self.token_ttl,
        }
    }
}

impl<E: Entity + HasOwner> std::fmt::Debug for TokenAwareManager<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAwareManager")
            .field("model", &E::MODEL_NAME)
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl<E: Entity + HasOwner> TokenAwareManager<E> {
    pub fn new(
        base: BaseManager<E>,
        validator: Arc<dyn TokenValidator>,
        cache: CacheManager,
        token_ttl: Duration,
    ) -> Self {
        Self {
            base,
            validator,
            cache,
            token_ttl,
        }
    }

    pub fn base(&self) -> &BaseManager<E> {
        &self.base
    }

    /// Validate through the cache. Only successful validations are cached.
    ///
    /// Unlike the other cached reads this one does not fall back to a miss:
    /// cache and validator failures are returned to the caller.
    pub async fn validate_token(
        &self,
        token: &str,
        action: &str,
        user_id: Option<&str>,
    ) -> AppResult<TokenValidation> {
        let key = keys::token_validation(token, action, user_id);
        if let Some(raw) = self.cache.get(&key).await? {
            match serde_json::from_str::<TokenValidation>(&raw) {
                Ok(validation) => return Ok(validation),
                Err(e) => debug!(key = %key, error = %e, "Ignoring undecodable token validation"),
            }
        }

        let validation = self.validator.validate_token(token, action, user_id).await?;
        if validation.valid {
            let raw = serde_json::to_string(&validation)?;
            self.cache.set(&key, &raw, self.token_ttl).await?;
        }
        Ok(validation)
    }

    /// Whether the scope's user (or the token's user) owns `entity`.
    pub fn check_ownership(
        entity: &E,
        scope: &TokenScope<'_>,
        validation: &TokenValidation,
    ) -> bool {
        match scope.user_id.or(validation.user_id.as_deref()) {
            Some(user_id) => entity.is_owned_by(user_id),
            None => false,
        }
    }

    /// Row by `identifier`, or `None` when the token is invalid or the
    /// caller does not own the row.
    pub async fn get_with_token(
        &self,
        identifier: &Value,
        scope: &TokenScope<'_>,
        field: Option<&str>,
    ) -> AppResult<Option<E>> {
        let validation = self
            .validate_token(scope.token, scope.action, scope.user_id)
            .await?;
        if !validation.valid {
            debug!(model = %E::MODEL_NAME, error = %validation.error_message(), "Token rejected");
            return Ok(None);
        }
        let found = self.base.get_by_field(identifier, field).await?;
        Ok(found.filter(|entity| {
            !scope.require_ownership || Self::check_ownership(entity, scope, &validation)
        }))
    }

    /// Query for `filters` under the scope, or `None` when the token is
    /// invalid. Ownership adds `owner_field = user`.
    pub(crate) async fn scoped_query(
        &self,
        scope: &TokenScope<'_>,
        filters: &Record,
    ) -> AppResult<Option<Query>> {
        let validation = self
            .validate_token(scope.token, scope.action, scope.user_id)
            .await?;
        if !validation.valid {
            return Ok(None);
        }
        let mut query = Query::new().filters(filters_for::<E>(filters));
        if scope.require_ownership {
            let Some(owner) = scope.user_id.map(str::to_string).or(validation.user_id) else {
                return Ok(None);
            };
            query = query.filter(FilterField::exact(E::owner_field(), owner));
        }
        Ok(Some(query))
    }

    /// Rows matching `filters`, empty when the token is invalid.
    pub async fn filter_with_token(
        &self,
        scope: &TokenScope<'_>,
        filters: &Record,
    ) -> AppResult<Vec<E>> {
        match self.scoped_query(scope, filters).await? {
            Some(query) => self.base.store().fetch(&query).await,
            None => Ok(Vec::new()),
        }
    }
}

/// Token-gated manager whose results are also cached per token scope.
#[derive(Debug, Clone)]
pub struct TokenCachedManager<E: Entity + HasOwner> {
    token: TokenAwareManager<E>,
    keys: CacheKeyBuilder,
    ttl: Duration,
}

impl<E: Entity + HasOwner> TokenCachedManager<E> {
    pub fn new(token: TokenAwareManager<E>, ttl: Duration) -> Self {
        Self {
            token,
            keys: CacheKeyBuilder::manager::<E>(),
            ttl,
        }
    }

    pub fn token_manager(&self) -> &TokenAwareManager<E> {
        &self.token
    }

    fn cache(&self) -> &CacheManager {
        &self.token.cache
    }

    fn get_key(&self, identifier: &Value, scope: &TokenScope<'_>, field: Option<&str>) -> String {
        let params = json!({
            "token_hash": keys::token_scope_hash(scope.token, scope.action),
            "user_id": scope.user_id,
            "require_ownership": scope.require_ownership,
            "field": field,
        });
        self.keys
            .key("token_get", Some(&value_to_string(identifier)), Some(&params))
    }

    /// Cached [`TokenAwareManager::get_with_token`].
    ///
    /// The token is always validated first. A cached row that the caller no
    /// longer owns is deleted and reported as `None`.
    pub async fn get_token_cached(
        &self,
        identifier: &Value,
        scope: &TokenScope<'_>,
        field: Option<&str>,
        force_refresh: bool,
    ) -> AppResult<Option<E>> {
        let validation = self
            .token
            .validate_token(scope.token, scope.action, scope.user_id)
            .await?;
        if !validation.valid {
            return Ok(None);
        }

        let key = self.get_key(identifier, scope, field);
        if !force_refresh {
            if let Some(raw) = read_cache(self.cache(), &key).await {
                if let Some(Some(entity)) = decode_cached::<E>(self.cache(), &key, &raw).await {
                    let owned =
                        TokenAwareManager::<E>::check_ownership(&entity, scope, &validation);
                    if scope.require_ownership && !owned {
                        debug!(key = %key, "Cached row failed ownership check");
                        let _ = self.cache().delete(&key).await;
                        return Ok(None);
                    }
                    return Ok(Some(entity));
                }
            }
        }

        let found = self.token.get_with_token(identifier, scope, field).await?;
        if let Some(entity) = &found {
            write_cache(self.cache(), &key, &Value::Object(entity.to_record()?), self.ttl).await;
        }
        Ok(found)
    }

    /// Cached [`TokenAwareManager::filter_with_token`] with ordering and
    /// slicing. The primary keys are cached and the rows re-read.
    pub async fn filter_token_cached(
        &self,
        scope: &TokenScope<'_>,
        filters: &Record,
        ordering: &[String],
        limit: Option<usize>,
        offset: Option<usize>,
        force_refresh: bool,
    ) -> AppResult<Vec<E>> {
        let Some(mut query) = self.token.scoped_query(scope, filters).await? else {
            return Ok(Vec::new());
        };

        let params = json!({
            "token_hash": keys::token_scope_hash(scope.token, scope.action),
            "user_id": scope.user_id,
            "filters": filters,
            "require_ownership": scope.require_ownership,
            "ordering": ordering,
            "limit": limit,
            "offset": offset,
        });
        let key = self.keys.key("token_filter", None, Some(&params));
        let ordering = SortField::parse_all(ordering);

        if !force_refresh {
            if let Some(raw) = read_cache(self.cache(), &key).await {
                match serde_json::from_str::<Vec<Value>>(&raw) {
                    Ok(ids) if ids.is_empty() => return Ok(Vec::new()),
                    Ok(ids) => {
                        let query = query
                            .filter(FilterField::is_in(E::pk_info().name, ids))
                            .order_by(ordering);
                        return self.token.base().store().fetch(&query).await;
                    }
                    Err(e) => {
                        debug!(key = %key, error = %e, "Dropping stale cache entry");
                        let _ = self.cache().delete(&key).await;
                    }
                }
            }
        }

        query = query.order_by(ordering);
        query.offset = offset;
        query.limit = limit;
        let rows = self.token.base().store().fetch(&query).await?;
        let ids = rows
            .iter()
            .map(Entity::pk_value)
            .collect::<AppResult<Vec<Value>>>()?;
        write_cache(self.cache(), &key, &Value::Array(ids), self.ttl).await;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use pipeline_core::error::{AppError, ErrorKind};
    use pipeline_database::MemoryStore;
    use pipeline_entity::Person;

    use super::*;

    /// Accepts `good-<user>` tokens for any action and counts calls.
    #[derive(Default)]
    struct PrefixValidator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TokenValidator for PrefixValidator {
        async fn validate_token(
            &self,
            token: &str,
            action: &str,
            user_id: Option<&str>,
        ) -> AppResult<TokenValidation> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match token.strip_prefix("good-") {
                Some(owner) if user_id.is_none_or(|u| u == owner) => {
                    TokenValidation::granted(owner, action, json!({"user_id": owner}))
                }
                Some(_) => TokenValidation::denied("User mismatch"),
                None => TokenValidation::denied("Invalid token"),
            })
        }
    }

    #[derive(Debug)]
    struct DownCache;

    #[async_trait]
    impl CacheProvider for DownCache {
        async fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::cache("connection refused"))
        }
        async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> AppResult<()> {
            Err(AppError::cache("connection refused"))
        }
        async fn set_default(&self, _key: &str, _value: &str) -> AppResult<()> {
            Err(AppError::cache("connection refused"))
        }
        async fn delete(&self, _key: &str) -> AppResult<()> {
            Err(AppError::cache("connection refused"))
        }
        async fn exists(&self, _key: &str) -> AppResult<bool> {
            Err(AppError::cache("connection refused"))
        }
        async fn delete_pattern(&self, _pattern: &str) -> AppResult<u64> {
            Err(AppError::cache("connection refused"))
        }
        async fn health_check(&self) -> AppResult<bool> {
            Ok(false)
        }
        async fn flush_all(&self) -> AppResult<()> {
            Err(AppError::cache("connection refused"))
        }
    }

    async fn setup() -> (TokenAwareManager<Person>, Arc<PrefixValidator>, Person, Person) {
        let base = BaseManager::new(Arc::new(MemoryStore::<Person>::new()));
        let ada = Person::new("Ada", Some("ada@example.com")).owned_by("u-1");
        let bob = Person::new("Bob", Some("bob@example.com")).owned_by("u-2");
        for person in [&ada, &bob] {
            base.store().insert(person.to_record().unwrap()).await.unwrap();
        }
        let validator = Arc::new(PrefixValidator::default());
        let manager = TokenAwareManager::new(
            base,
            validator.clone(),
            CacheManager::in_memory(),
            Duration::from_secs(300),
        );
        (manager, validator, ada, bob)
    }

    #[tokio::test]
    async fn test_validation_is_cached_only_when_valid() {
        let (manager, validator, _, _) = setup().await;
        assert!(manager.validate_token("good-u-1", "read", None).await.unwrap().valid);
        assert!(manager.validate_token("good-u-1", "read", None).await.unwrap().valid);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);

        assert!(!manager.validate_token("bad", "read", None).await.unwrap().valid);
        assert!(!manager.validate_token("bad", "read", None).await.unwrap().valid);
        assert_eq!(validator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cache_outage_propagates_from_token_reads() {
        let (manager, validator, ada, _) = setup().await;
        let manager = TokenAwareManager::new(
            manager.base().clone(),
            validator.clone(),
            CacheManager::from_provider(Arc::new(DownCache)),
            Duration::from_secs(300),
        );
        let scope = TokenScope::new("good-u-1");

        let err = manager
            .get_with_token(&json!(ada.email), &scope, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);

        let err = manager
            .filter_with_token(&scope, &Record::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);

        // Nothing was served from the store behind a failed validation.
        assert_eq!(validator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validator_failure_propagates() {
        struct Unreachable;

        #[async_trait]
        impl TokenValidator for Unreachable {
            async fn validate_token(
                &self,
                _token: &str,
                _action: &str,
                _user_id: Option<&str>,
            ) -> AppResult<TokenValidation> {
                Err(AppError::cache("blocklist unavailable"))
            }
        }

        let (manager, _, ada, _) = setup().await;
        let manager = TokenAwareManager::new(
            manager.base().clone(),
            Arc::new(Unreachable),
            CacheManager::in_memory(),
            Duration::from_secs(300),
        );
        let scope = TokenScope::new("good-u-1");
        assert!(manager.get_with_token(&json!(ada.email), &scope, None).await.is_err());
    }

    #[tokio::test]
    async fn test_get_with_token_checks_ownership() {
        let (manager, _, ada, bob) = setup().await;
        let scope = TokenScope::new("good-u-1").owned(true);

        let own = manager.get_with_token(&json!(ada.email), &scope, None).await.unwrap();
        assert_eq!(own.map(|p| p.uuid), Some(ada.uuid));

        let other = manager.get_with_token(&json!(bob.email), &scope, None).await.unwrap();
        assert!(other.is_none());

        let open = TokenScope::new("good-u-1");
        let found = manager.get_with_token(&json!(bob.email), &open, None).await;
        assert!(found.unwrap().is_some());

        let invalid = TokenScope::new("bad");
        let found = manager.get_with_token(&json!(ada.email), &invalid, None).await;
        assert!(found.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filter_with_token_adds_owner_filter() {
        let (manager, _, _, _) = setup().await;
        let all = manager
            .filter_with_token(&TokenScope::new("good-u-2"), &Record::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let owned = manager
            .filter_with_token(&TokenScope::new("good-u-2").owned(true), &Record::new())
            .await
            .unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "Bob");

        let denied = manager
            .filter_with_token(&TokenScope::new("bad"), &Record::new())
            .await
            .unwrap();
        assert!(denied.is_empty());
    }

    #[tokio::test]
    async fn test_token_cached_get_rechecks_ownership() {
        let (manager, _, ada, _) = setup().await;
        let cached = TokenCachedManager::new(manager, Duration::from_secs(300));
        let scope = TokenScope::new("good-u-1").owned(true);
        let id = json!(ada.uuid.to_string());

        let first = cached
            .get_token_cached(&id, &scope, Some("uuid"), false)
            .await
            .unwrap();
        assert!(first.is_some());

        // Hand the row to another user behind the cache's back.
        let changes = json!({"user_id": "u-9"}).as_object().cloned().unwrap();
        cached
            .token_manager()
            .base()
            .store()
            .update(&[FilterField::exact("uuid", id.clone())], &changes)
            .await
            .unwrap();

        // The cached copy still says u-1, so it is served.
        let stale = cached.get_token_cached(&id, &scope, Some("uuid"), false).await;
        assert!(stale.unwrap().is_some());
        // A fresh read sees the new owner.
        let fresh = cached.get_token_cached(&id, &scope, Some("uuid"), true).await;
        assert!(fresh.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_cached_filter() {
        let (manager, _, _, _) = setup().await;
        let cached = TokenCachedManager::new(manager, Duration::from_secs(300));
        let scope = TokenScope::new("good-u-1");
        let order = vec!["name".to_string()];

        let rows = cached
            .filter_token_cached(&scope, &Record::new(), &order, Some(1), Some(1), false)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Bob");

        let again = cached
            .filter_token_cached(&scope, &Record::new(), &order, Some(1), Some(1), false)
            .await
            .unwrap();
        assert_eq!(again, rows);

        let denied = cached
            .filter_token_cached(&TokenScope::new("bad"), &Record::new(), &[], None, None, false)
            .await
            .unwrap();
        assert!(denied.is_empty());
    }
}
