//! Server-sent event frames.

use axum::response::sse::Event;
use chrono::Utc;
use serde_json::{Value, json};

use super::model::Notification;

/// One SSE frame: `event: <type>\ndata: <json>\n\n`.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    /// `connection`, `heartbeat`, `notification` or `error`.
    pub event: String,
    pub data: Value,
}

impl SseEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    pub fn connection(data: Value) -> Self {
        Self::new("connection", data)
    }

    pub fn heartbeat(count: u64) -> Self {
        Self::new(
            "heartbeat",
            json!({ "timestamp": Utc::now().to_rfc3339(), "count": count }),
        )
    }

    pub fn notification(notification: &Notification) -> Self {
        Self::new("notification", notification.to_dict())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(
            "error",
            json!({ "message": message.into(), "timestamp": Utc::now().to_rfc3339() }),
        )
    }

    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

impl From<SseEvent> for Event {
    fn from(value: SseEvent) -> Self {
        Event::default()
            .event(value.event)
            .data(value.data.to_string())
    }
}
