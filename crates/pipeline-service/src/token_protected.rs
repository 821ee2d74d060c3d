//! Service whose every operation requires a valid token.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use pipeline_core::error::AppError;
use pipeline_core::result::AppResult;
use pipeline_core::traits::{Entity, HasOwner, Service, TokenValidation};
use pipeline_core::types::{FilterField, Record};

use crate::crud::OperationOutcome;
use crate::crud::model::{pk_arg, strip_pk_keys, to_json};
use crate::manager::{TokenAwareManager, TokenScope};

/// Token-gated CRUD over an owned entity.
///
/// `execute` takes `token`, `user_id` and `action` out of the arguments.
/// The action defaults to the operation name, and an invalid token fails
/// the call with a permission error before any operation runs.
#[derive(Debug, Clone)]
pub struct TokenProtectedService<E: Entity + HasOwner> {
    name: String,
    manager: TokenAwareManager<E>,
}

impl<E: Entity + HasOwner> TokenProtectedService<E> {
    pub fn new(name: impl Into<String>, manager: TokenAwareManager<E>) -> Self {
        Self {
            name: name.into(),
            manager,
        }
    }

    pub fn manager(&self) -> &TokenAwareManager<E> {
        &self.manager
    }

    fn pk_filter(identifier: &Value) -> [FilterField; 1] {
        [FilterField::exact(E::pk_info().name, identifier.clone())]
    }

    /// Owned row by primary key, `None` when the token is invalid or the
    /// caller does not own it.
    pub async fn get_with_token(
        &self,
        token: &str,
        identifier: &Value,
        user_id: Option<&str>,
    ) -> AppResult<Option<E>> {
        let scope = TokenScope::new(token).user(user_id).owned(true);
        self.manager
            .get_with_token(identifier, &scope, Some(&E::pk_info().name))
            .await
    }

    /// Create a row owned by the token's user.
    pub async fn create_with_token(
        &self,
        token: &str,
        data: Record,
        user_id: Option<&str>,
    ) -> AppResult<OperationOutcome<E>> {
        let validation = self.manager.validate_token(token, "create", user_id).await?;
        self.create_as(&validation, data).await
    }

    pub async fn update_with_token(
        &self,
        token: &str,
        identifier: &Value,
        data: Record,
        user_id: Option<&str>,
    ) -> AppResult<OperationOutcome<E>> {
        let validation = self.manager.validate_token(token, "update", user_id).await?;
        self.update_as(&validation, identifier, data).await
    }

    pub async fn delete_with_token(
        &self,
        token: &str,
        identifier: &Value,
        user_id: Option<&str>,
    ) -> AppResult<OperationOutcome<Value>> {
        let validation = self.manager.validate_token(token, "delete", user_id).await?;
        self.delete_as(&validation, identifier).await
    }

    async fn owned_row(
        &self,
        validation: &TokenValidation,
        identifier: &Value,
    ) -> AppResult<Option<E>> {
        let Some(user_id) = validation.user_id.as_deref() else {
            return Ok(None);
        };
        let found = self
            .manager
            .base()
            .store()
            .fetch_one(&Self::pk_filter(identifier))
            .await?;
        Ok(found.filter(|entity| entity.is_owned_by(user_id)))
    }

    async fn create_as(
        &self,
        validation: &TokenValidation,
        mut data: Record,
    ) -> AppResult<OperationOutcome<E>> {
        if !validation.valid {
            return Ok(OperationOutcome::failed(validation.error_message()));
        }
        if let Some(user_id) = &validation.user_id {
            data.insert(E::owner_field().to_string(), Value::String(user_id.clone()));
        }
        let entity = self.manager.base().store().insert(data).await?;
        info!(
            model = %E::MODEL_NAME,
            user_id = ?validation.user_id,
            "Created {}",
            entity.display()
        );
        Ok(OperationOutcome::ok(entity, "Created successfully"))
    }

    async fn update_as(
        &self,
        validation: &TokenValidation,
        identifier: &Value,
        data: Record,
    ) -> AppResult<OperationOutcome<E>> {
        if !validation.valid {
            return Ok(OperationOutcome::failed(validation.error_message()));
        }
        if self.owned_row(validation, identifier).await?.is_none() {
            return Ok(OperationOutcome::failed("Update failed"));
        }
        let mut changes = strip_pk_keys::<E>(data);
        changes.remove(E::owner_field());
        let updated = self
            .manager
            .base()
            .store()
            .update(&Self::pk_filter(identifier), &changes)
            .await?;
        Ok(match updated.into_iter().next() {
            Some(entity) => OperationOutcome::ok(entity, "Updated successfully"),
            None => OperationOutcome::failed("Update failed"),
        })
    }

    async fn delete_as(
        &self,
        validation: &TokenValidation,
        identifier: &Value,
    ) -> AppResult<OperationOutcome<Value>> {
        if !validation.valid {
            return Ok(OperationOutcome::failed(validation.error_message()));
        }
        if self.owned_row(validation, identifier).await?.is_none() {
            return Ok(OperationOutcome::failed("Delete failed"));
        }
        let deleted = self
            .manager
            .base()
            .store()
            .delete(&Self::pk_filter(identifier))
            .await?;
        Ok(if deleted > 0 {
            OperationOutcome::ok(identifier.clone(), "Deleted successfully")
        } else {
            OperationOutcome::failed("Delete failed")
        })
    }
}

fn take_str(args: &mut Record, key: &str) -> Option<String> {
    match args.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

#[async_trait]
impl<E: Entity + HasOwner> Service for TokenProtectedService<E> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, operation: &str, mut args: Record) -> AppResult<Value> {
        let token = take_str(&mut args, "token")
            .ok_or_else(|| AppError::permission_denied("Token required"))?;
        let user_id = take_str(&mut args, "user_id");
        let action = take_str(&mut args, "action").unwrap_or_else(|| operation.to_string());

        let validation = self
            .manager
            .validate_token(&token, &action, user_id.as_deref())
            .await?;
        if !validation.valid {
            warn!(
                service = %self.name,
                operation,
                "Token rejected: {}",
                validation.error_message()
            );
            return Err(AppError::permission_denied(validation.error_message()));
        }

        let identifier =
            || pk_arg::<E>(&args).ok_or_else(|| AppError::validation("Missing identifier"));
        match operation {
            "get_with_token" | "get" => {
                let pk = identifier()?;
                to_json(&self.owned_row(&validation, &pk).await?)
            }
            "create_with_token" | "create" => to_json(&self.create_as(&validation, args).await?),
            "update_with_token" | "update" => {
                let pk = identifier()?;
                to_json(&self.update_as(&validation, &pk, args).await?)
            }
            "delete_with_token" | "delete" => {
                let pk = identifier()?;
                to_json(&self.delete_as(&validation, &pk).await?)
            }
            other => Err(AppError::validation(format!("Unknown operation: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use pipeline_auth::TokenService;
    use pipeline_cache::CacheManager;
    use pipeline_core::config::auth::AuthConfig;
    use pipeline_core::ErrorKind;
    use pipeline_database::MemoryStore;
    use pipeline_entity::Person;
    use serde_json::json;

    use super::*;
    use crate::manager::BaseManager;

    struct Fixture {
        service: TokenProtectedService<Person>,
        tokens: TokenService,
    }

    impl Fixture {
        fn new() -> Self {
            let cache = CacheManager::in_memory();
            let config = AuthConfig {
                jwt_secret: "test-secret".into(),
                ..AuthConfig::default()
            };
            let tokens = TokenService::new(&config, cache.clone());
            let manager = TokenAwareManager::new(
                BaseManager::new(Arc::new(MemoryStore::<Person>::new())),
                Arc::new(tokens.clone()),
                cache,
                Duration::from_secs(300),
            );
            Self {
                service: TokenProtectedService::new("people_protected", manager),
                tokens,
            }
        }

        fn token(&self, user_id: &str, action: &str) -> String {
            self.tokens.generate(user_id, action, None, None).unwrap().token
        }
    }

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_owner() {
        let fx = Fixture::new();
        let out = fx
            .service
            .create_with_token(&fx.token("u-1", "create"), rec(json!({"name": "Ada"})), None)
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.message, "Created successfully");
        assert_eq!(out.value.unwrap().user_id.as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_update_and_delete_require_ownership() {
        let fx = Fixture::new();
        let ada = fx
            .service
            .create_with_token(&fx.token("u-1", "create"), rec(json!({"name": "Ada"})), None)
            .await
            .unwrap()
            .value
            .unwrap();
        let pk = json!(ada.uuid);

        let stranger = fx
            .service
            .update_with_token(
                &fx.token("u-2", "update"),
                &pk,
                rec(json!({"name": "Mallory"})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(stranger.message, "Update failed");

        let owner = fx
            .service
            .update_with_token(
                &fx.token("u-1", "update"),
                &pk,
                rec(json!({"name": "Ada L."})),
                None,
            )
            .await
            .unwrap();
        assert_eq!(owner.message, "Updated successfully");
        assert_eq!(owner.value.unwrap().name, "Ada L.");

        let wrong_action = fx
            .service
            .delete_with_token(&fx.token("u-1", "update"), &pk, None)
            .await
            .unwrap();
        assert_eq!(wrong_action.message, "Insufficient permissions");

        let deleted = fx
            .service
            .delete_with_token(&fx.token("u-1", "delete"), &pk, None)
            .await
            .unwrap();
        assert_eq!(deleted.message, "Deleted successfully");
        let gone = fx
            .service
            .get_with_token(&fx.token("u-1", "read"), &pk, None)
            .await
            .unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn test_execute_pops_token_and_defaults_action() {
        let fx = Fixture::new();
        let created = fx
            .service
            .run(
                "create",
                rec(json!({"token": fx.token("u-1", "create"), "name": "Ada"})),
            )
            .await
            .unwrap();
        assert_eq!(created["success"], true);
        assert!(created["value"].get("token").is_none());

        let uuid = created["value"]["uuid"].clone();
        let found = fx
            .service
            .run("get", rec(json!({"token": fx.token("u-1", "read"), "id": uuid})))
            .await
            .unwrap();
        assert_eq!(found["name"], "Ada");
    }

    #[tokio::test]
    async fn test_execute_rejects_bad_tokens() {
        let fx = Fixture::new();
        let err = fx.service.run("get", Record::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);

        let err = fx
            .service
            .run("update", rec(json!({"token": fx.token("u-1", "read"), "id": "x"})))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::PermissionDenied);
        assert_eq!(err.message, "Insufficient permissions");
    }
}
