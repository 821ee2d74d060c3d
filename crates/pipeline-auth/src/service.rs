//! Token service: issue, validate and revoke action tokens.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use pipeline_cache::CacheManager;
use pipeline_cache::keys;
use pipeline_core::config::auth::AuthConfig;
use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::cache::CacheProvider;
use pipeline_core::traits::service::Service;
use pipeline_core::traits::token::{TokenValidation, TokenValidator};
use pipeline_core::types::record::Record;

use crate::jwt::{TokenClaims, TokenDecoder, TokenEncoder};

/// Blocklist entries outlive the token by at least this long.
const MIN_BLOCKLIST_TTL: Duration = Duration::from_secs(60);

/// A freshly issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub success: bool,
    pub token: String,
    pub expires_in: u64,
    pub payload: TokenClaims,
}

/// Outcome of a revocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevokedToken {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Issues and checks HS256 action tokens. Revoked tokens are remembered in
/// the cache until they would have expired anyway.
#[derive(Debug, Clone)]
pub struct TokenService {
    encoder: TokenEncoder,
    decoder: TokenDecoder,
    cache: CacheManager,
    default_expires_in: u64,
}

impl TokenService {
    pub fn new(config: &AuthConfig, cache: CacheManager) -> Self {
        Self {
            encoder: TokenEncoder::new(config),
            decoder: TokenDecoder::new(config),
            cache,
            default_expires_in: config.token_expires_in_seconds,
        }
    }

    /// Issue a token for `user_id` granting `action`.
    pub fn generate(
        &self,
        user_id: &str,
        action: &str,
        expires_in: Option<u64>,
        metadata: Option<Value>,
    ) -> AppResult<IssuedToken> {
        let expires_in = expires_in.unwrap_or(self.default_expires_in);
        let claims = TokenClaims::new(user_id, action, Utc::now(), expires_in as i64, metadata);
        let token = self.encoder.encode(&claims)?;
        debug!(user_id, action, expires_in, "Issued action token");
        Ok(IssuedToken {
            success: true,
            token,
            expires_in,
            payload: claims,
        })
    }

    /// Check `token` for `action` and, when given, for `user_id`.
    ///
    /// Fails when the blocklist cannot be consulted.
    pub async fn validate(
        &self,
        token: &str,
        action: &str,
        user_id: Option<&str>,
    ) -> AppResult<TokenValidation> {
        let claims = match self.decoder.decode(token) {
            Ok(claims) => claims,
            Err(failure) => return Ok(TokenValidation::denied(failure.message())),
        };

        if self.is_revoked(token).await? {
            return Ok(TokenValidation::denied("Token revoked"));
        }
        if !claims.permits(action) {
            return Ok(TokenValidation::denied("Insufficient permissions"));
        }
        if let Some(expected) = user_id.filter(|u| !u.is_empty()) {
            if claims.user_id != expected {
                return Ok(TokenValidation::denied("User mismatch"));
            }
        }

        let payload = serde_json::to_value(&claims)?;
        Ok(TokenValidation::granted(claims.user_id, claims.action, payload))
    }

    /// Blocklist `token` until its expiry.
    pub async fn revoke(&self, token: &str) -> AppResult<RevokedToken> {
        let claims = match self.decoder.decode_ignoring_expiry(token) {
            Ok(claims) => claims,
            Err(failure) => {
                return Ok(RevokedToken {
                    success: false,
                    message: None,
                    error: Some(failure.message().to_string()),
                });
            }
        };

        let ttl = Duration::from_secs(claims.remaining_ttl_seconds()).max(MIN_BLOCKLIST_TTL);
        self.cache
            .set(&keys::jwt_blocklist(token), "revoked", ttl)
            .await
            .map_err(|e| AppError::internal(format!("Failed to blocklist token: {e}")))?;

        info!(user_id = %claims.user_id, action = %claims.action, "Token revoked");
        Ok(RevokedToken {
            success: true,
            message: Some("Token revoked".to_string()),
            error: None,
        })
    }

    async fn is_revoked(&self, token: &str) -> AppResult<bool> {
        self.cache.exists(&keys::jwt_blocklist(token)).await.map_err(|e| {
            warn!(error = %e, "Token blocklist unavailable");
            e
        })
    }
}

#[async_trait]
impl TokenValidator for TokenService {
    async fn validate_token(
        &self,
        token: &str,
        action: &str,
        user_id: Option<&str>,
    ) -> AppResult<TokenValidation> {
        self.validate(token, action, user_id).await
    }
}

#[async_trait]
impl Service for TokenService {
    fn name(&self) -> &str {
        "token_service"
    }

    async fn execute(&self, operation: &str, args: Record) -> AppResult<Value> {
        match operation {
            "validate" => {
                let token = required_str(&args, "token")?;
                let action = optional_str(&args, "action").unwrap_or("read");
                let validation = self
                    .validate(token, action, optional_str(&args, "user_id"))
                    .await?;
                Ok(serde_json::to_value(validation)?)
            }
            "generate" => {
                let user_id = required_str(&args, "user_id")?;
                let action = optional_str(&args, "action").unwrap_or("read");
                let expires_in = args.get("expires_in").and_then(Value::as_u64);
                let metadata = args.get("metadata").cloned();
                Ok(serde_json::to_value(self.generate(user_id, action, expires_in, metadata)?)?)
            }
            "revoke" => {
                let token = required_str(&args, "token")?;
                Ok(serde_json::to_value(self.revoke(token).await?)?)
            }
            other => Err(AppError::validation(format!("Unknown operation: {other}"))),
        }
    }
}

fn optional_str<'a>(args: &'a Record, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn required_str<'a>(args: &'a Record, key: &str) -> AppResult<&'a str> {
    optional_str(args, key)
        .ok_or_else(|| AppError::validation(format!("Missing required argument: {key}")))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use pipeline_core::error::ErrorKind;
    use serde_json::json;

    use super::*;

    /// In-memory cache whose backend can be switched off mid-test.
    #[derive(Debug)]
    struct SwitchableCache {
        inner: CacheManager,
        down: AtomicBool,
    }

    impl SwitchableCache {
        fn new() -> Self {
            Self {
                inner: CacheManager::in_memory(),
                down: AtomicBool::new(false),
            }
        }

        fn take_down(&self) {
            self.down.store(true, Ordering::SeqCst);
        }

        fn check(&self) -> AppResult<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(AppError::cache("connection refused"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CacheProvider for SwitchableCache {
        async fn get(&self, key: &str) -> AppResult<Option<String>> {
            self.check()?;
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
            self.check()?;
            self.inner.set(key, value, ttl).await
        }
        async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
            self.check()?;
            self.inner.set_default(key, value).await
        }
        async fn delete(&self, key: &str) -> AppResult<()> {
            self.check()?;
            self.inner.delete(key).await
        }
        async fn exists(&self, key: &str) -> AppResult<bool> {
            self.check()?;
            self.inner.exists(key).await
        }
        async fn delete_pattern(&self, pattern: &str) -> AppResult<u64> {
            self.check()?;
            self.inner.delete_pattern(pattern).await
        }
        async fn health_check(&self) -> AppResult<bool> {
            Ok(!self.down.load(Ordering::SeqCst))
        }
        async fn flush_all(&self) -> AppResult<()> {
            self.check()?;
            self.inner.flush_all().await
        }
    }

    fn service() -> TokenService {
        TokenService::new(&AuthConfig::default(), CacheManager::in_memory())
    }

    #[tokio::test]
    async fn test_generate_then_validate() {
        let svc = service();
        let issued = svc.generate("u1", "update", None, Some(json!({"scope": "x"}))).unwrap();
        assert!(issued.success);
        assert_eq!(issued.expires_in, 3600);

        let result = svc.validate(&issued.token, "update", Some("u1")).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.user_id.as_deref(), Some("u1"));
        assert_eq!(result.payload.unwrap()["metadata"]["scope"], "x");
    }

    #[tokio::test]
    async fn test_read_is_granted_by_any_action() {
        let svc = service();
        let issued = svc.generate("u1", "delete", None, None).unwrap();
        assert!(svc.validate(&issued.token, "read", None).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let svc = service();
        let issued = svc.generate("u1", "read", None, None).unwrap();

        let denied = svc.validate(&issued.token, "update", None).await.unwrap();
        assert_eq!(denied.error_message(), "Insufficient permissions");

        let denied = svc.validate(&issued.token, "read", Some("u2")).await.unwrap();
        assert_eq!(denied.error_message(), "User mismatch");

        let denied = svc.validate("not-a-token", "read", None).await.unwrap();
        assert_eq!(denied.error_message(), "Invalid token");
    }

    #[tokio::test]
    async fn test_expired_token() {
        let svc = service();
        let claims = TokenClaims::new("u1", "read", Utc::now(), -30, None);
        let token = svc.encoder.encode(&claims).unwrap();
        let expired = svc.validate(&token, "read", None).await.unwrap();
        assert_eq!(expired.error_message(), "Token expired");
    }

    #[tokio::test]
    async fn test_foreign_secret_is_invalid() {
        let other = TokenService::new(
            &AuthConfig {
                jwt_secret: "other-secret".into(),
                ..AuthConfig::default()
            },
            CacheManager::in_memory(),
        );
        let issued = other.generate("u1", "read", None, None).unwrap();
        let result = service().validate(&issued.token, "read", None).await.unwrap();
        assert_eq!(result.error_message(), "Invalid token");
    }

    #[tokio::test]
    async fn test_revoked_token_is_rejected() {
        let svc = service();
        let issued = svc.generate("u1", "read", Some(120), None).unwrap();
        let revoked = svc.revoke(&issued.token).await.unwrap();
        assert_eq!(revoked.message.as_deref(), Some("Token revoked"));
        let result = svc.validate(&issued.token, "read", None).await.unwrap();
        assert_eq!(result.error_message(), "Token revoked");

        let garbage = svc.revoke("garbage").await.unwrap();
        assert!(!garbage.success);
    }

    #[tokio::test]
    async fn test_blocklist_outage_fails_closed() {
        let cache = Arc::new(SwitchableCache::new());
        let svc = TokenService::new(
            &AuthConfig::default(),
            CacheManager::from_provider(cache.clone()),
        );
        let issued = svc.generate("u1", "read", Some(120), None).unwrap();
        svc.revoke(&issued.token).await.unwrap();

        cache.take_down();
        let err = svc.validate(&issued.token, "read", None).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);

        let err = svc
            .validate_token(&issued.token, "read", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cache);

        let mut args = Record::new();
        args.insert("token".into(), json!(issued.token));
        assert!(svc.run("validate", args).await.is_err());
    }

    #[tokio::test]
    async fn test_service_dispatch() {
        let svc = service();
        let mut args = Record::new();
        args.insert("user_id".into(), json!("u9"));
        args.insert("action".into(), json!("create"));
        let issued = svc.run("generate", args).await.unwrap();
        let token = issued["token"].as_str().unwrap().to_string();

        let mut args = Record::new();
        args.insert("token".into(), json!(token));
        args.insert("action".into(), json!("create"));
        let validation = svc.run("validate", args).await.unwrap();
        assert_eq!(validation["valid"], true);

        let err = svc.run("refresh", Record::new()).await.unwrap_err();
        assert_eq!(err.message, "Unknown operation: refresh");
    }
}
