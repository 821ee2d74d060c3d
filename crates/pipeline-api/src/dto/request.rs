//! Request DTOs with validation.

use serde::Deserialize;
use serde_json::Value;
use validator::Validate;

use pipeline_core::types::record::value_to_string;

/// `POST /notifications` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendNotificationRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub title: String,
    /// Recipients; ids may be strings or numbers.
    #[serde(default)]
    pub user_ids: Option<Vec<Value>>,
}

impl SendNotificationRequest {
    /// Recipient ids as strings, `None` when no non-empty list was given.
    pub fn recipients(&self) -> Option<Vec<String>> {
        self.user_ids
            .as_ref()
            .filter(|ids| !ids.is_empty())
            .map(|ids| ids.iter().map(value_to_string).collect())
    }
}

/// `GET /notifications` query.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyQuery {
    pub message: Option<String>,
    #[serde(default = "default_level")]
    pub level: String,
    pub title: Option<String>,
    pub redirect: Option<String>,
}

/// `POST /tokens` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IssueTokenRequest {
    #[validate(length(min = 1, message = "user_id is required"))]
    pub user_id: String,
    #[serde(default = "default_action")]
    pub action: String,
    pub expires_in: Option<u64>,
    pub metadata: Option<Value>,
}

/// `POST /tokens/revoke` body.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RevokeTokenRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_action() -> String {
    "read".to_string()
}
