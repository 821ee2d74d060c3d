//! Claims carried by an action token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JWT payload: who may perform which action until when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: String,
    /// Action the token grants. Tokens without one grant `read`.
    #[serde(default = "default_action")]
    pub action: String,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Free-form data attached by the issuer.
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

impl TokenClaims {
    /// Claims for `user_id` and `action`, valid for `expires_in` seconds
    /// from `now`.
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        now: DateTime<Utc>,
        expires_in: i64,
        metadata: Option<Value>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            action: action.into(),
            exp: now.timestamp() + expires_in,
            iat: now.timestamp(),
            metadata: metadata.unwrap_or_else(empty_object),
        }
    }

    /// Seconds until expiry, zero once expired.
    pub fn remaining_ttl_seconds(&self) -> u64 {
        let remaining = self.exp - Utc::now().timestamp();
        if remaining > 0 { remaining as u64 } else { 0 }
    }

    /// Whether the token grants `required`.
    ///
    /// `read` is granted by every token; any other action must match
    /// exactly.
    pub fn permits(&self, required: &str) -> bool {
        required == "read" || self.action == required
    }
}

fn default_action() -> String {
    "read".to_string()
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
