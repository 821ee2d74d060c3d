//! Response DTOs.

use serde::Serialize;
use serde_json::Value;

use crate::pagination::PaginationContext;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Detailed health response.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedHealthResponse {
    pub status: String,
    pub cache: String,
    pub services: Vec<String>,
    pub online_users: usize,
    pub stored_notifications: usize,
}

/// JSON list page.
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub items: Vec<Value>,
    pub pagination: PaginationContext,
}

/// Answer of a notification call that produced no channel-specific response.
#[derive(Debug, Clone, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    /// `flash` or `broadcast`.
    pub delivered: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipients: Option<usize>,
}

/// Pending notifications of the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PendingResponse {
    /// Notifications parked for the user since their last stream.
    pub notifications: Vec<Value>,
    /// Flash messages of this browser session.
    pub messages: Vec<Value>,
}
