//! The notification value object.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use pipeline_core::error::AppError;

use super::event::SseEvent;

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for NotificationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "warning" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            other => Err(AppError::validation(format!(
                "Invalid notification level: {other}"
            ))),
        }
    }
}

/// A user-facing notification.
///
/// Built once per notification call and read once by whichever channel
/// delivers it (flash message, `HX-Trigger` header or SSE event).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// `notif_{unix_secs}_{message hash % 10000}`.
    pub id: String,
    pub message: String,
    pub level: NotificationLevel,
    pub title: String,
    pub icon: String,
    /// Display time in milliseconds.
    pub duration: u64,
    pub dismissible: bool,
    pub position: String,
    pub data: Map<String, Value>,
    pub tags: Vec<String>,
    pub source: String,
    /// Unix time in fractional seconds.
    pub timestamp: f64,
    pub redirect_url: Option<String>,
    pub replace_form: bool,
    pub target: Option<String>,
    pub swap: String,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel) -> Self {
        let message = message.into();
        let now = Utc::now();
        let mut hasher = DefaultHasher::new();
        message.hash(&mut hasher);

        Self {
            id: format!("notif_{}_{}", now.timestamp(), hasher.finish() % 10_000),
            message,
            level,
            title: String::new(),
            icon: String::new(),
            duration: 5000,
            dismissible: true,
            position: "top-right".to_string(),
            data: Map::new(),
            tags: Vec::new(),
            source: "system".to_string(),
            timestamp: now.timestamp_millis() as f64 / 1000.0,
            redirect_url: None,
            replace_form: false,
            target: None,
            swap: "innerHTML".to_string(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Success)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Error)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Warning)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, NotificationLevel::Info)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = icon.into();
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration = duration_ms;
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = position.into();
        self
    }

    pub fn dismissible(mut self, dismissible: bool) -> Self {
        self.dismissible = dismissible;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_redirect(mut self, url: Option<String>) -> Self {
        self.redirect_url = url;
        self
    }

    pub fn replace_form(mut self, replace: bool) -> Self {
        self.replace_form = replace;
        self
    }

    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    pub fn with_swap(mut self, swap: impl Into<String>) -> Self {
        self.swap = swap.into();
        self
    }

    pub fn to_dict(&self) -> Value {
        json!({
            "id": self.id,
            "message": self.message,
            "level": self.level.as_str(),
            "title": self.title,
            "icon": self.icon,
            "duration": self.duration,
            "dismissible": self.dismissible,
            "position": self.position,
            "data": self.data,
            "tags": self.tags,
            "source": self.source,
            "timestamp": self.timestamp,
            "redirect_url": self.redirect_url,
            "replace_form": self.replace_form,
            "target": self.target,
            "swap": self.swap,
        })
    }

    /// `event: notification` frame carrying [`Self::to_dict`].
    pub fn to_sse_format(&self) -> String {
        SseEvent::notification(self).to_wire()
    }

    /// Payload for the `HX-Trigger` response header.
    pub fn to_htmx_trigger(&self) -> Value {
        json!({ "showNotification": self.to_dict() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let n = Notification::info("Saved");
        assert_eq!(n.duration, 5000);
        assert!(n.dismissible);
        assert_eq!(n.position, "top-right");
        assert_eq!(n.source, "system");
        assert_eq!(n.swap, "innerHTML");
        assert!(n.target.is_none());
    }

    #[test]
    fn test_id_shape() {
        let n = Notification::success("Saved");
        let parts: Vec<&str> = n.id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "notif");
        assert_eq!(parts[1].parse::<i64>().unwrap(), n.timestamp as i64);
        assert!(parts[2].parse::<u64>().unwrap() < 10_000);
    }

    #[test]
    fn test_dict_has_every_field() {
        let dict = Notification::warning("Careful")
            .with_title("Heads up")
            .with_target(Some("#box".into()))
            .to_dict();
        let keys: Vec<&str> = dict.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "id", "message", "level", "title", "icon", "duration", "dismissible", "position",
            "data", "tags", "source", "timestamp", "redirect_url", "replace_form", "target",
            "swap",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        assert_eq!(dict["level"], "warning");
        assert_eq!(dict["target"], "#box");
        assert_eq!(dict["redirect_url"], Value::Null);
    }

    #[test]
    fn test_encodings() {
        let n = Notification::error("Boom");
        let frame = n.to_sse_format();
        assert!(frame.starts_with("event: notification\ndata: {"));
        assert!(frame.ends_with("}\n\n"));
        assert_eq!(n.to_htmx_trigger()["showNotification"]["message"], "Boom");
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("SUCCESS".parse::<NotificationLevel>().unwrap(), NotificationLevel::Success);
        assert!("loud".parse::<NotificationLevel>().is_err());
        assert_eq!(NotificationLevel::default(), NotificationLevel::Info);
    }
}
