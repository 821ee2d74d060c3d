//! Token validation seam used by token-aware managers and services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::AppResult;

/// Outcome of validating an access token for an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Decoded claims of a valid token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TokenValidation {
    pub fn granted(user_id: impl Into<String>, action: impl Into<String>, payload: Value) -> Self {
        Self {
            valid: true,
            user_id: Some(user_id.into()),
            action: Some(action.into()),
            payload: Some(payload),
            error: None,
        }
    }

    pub fn denied(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            user_id: None,
            action: None,
            payload: None,
            error: Some(error.into()),
        }
    }

    /// Error message for a denied token.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Token validation failed")
    }
}

/// Validates access tokens.
#[async_trait]
pub trait TokenValidator: Send + Sync + 'static {
    /// Validate `token` for `action`, optionally pinning it to `user_id`.
    ///
    /// A rejected token is `Ok` with `valid == false`. `Err` is reserved for
    /// failures of the backing services, such as an unreachable blocklist.
    async fn validate_token(
        &self,
        token: &str,
        action: &str,
        user_id: Option<&str>,
    ) -> AppResult<TokenValidation>;
}
