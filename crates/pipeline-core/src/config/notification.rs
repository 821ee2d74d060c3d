//! Notification store and SSE stream configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// How long undelivered notifications stay in the store.
    #[serde(default = "default_hour")]
    pub store_expiry_seconds: u64,
    /// Emit a heartbeat every N stream ticks.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_interval: u64,
    /// Length of one stream tick in milliseconds.
    #[serde(default = "default_tick")]
    pub tick_interval_ms: u64,
    /// Hard cap on the lifetime of one SSE connection.
    #[serde(default = "default_hour")]
    pub max_connection_seconds: u64,
    /// Capacity of each per-user live channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Display duration in milliseconds.
    #[serde(default = "default_duration")]
    pub default_duration_ms: u64,
    #[serde(default = "default_position")]
    pub default_position: String,
    /// Element that hosts client-side notifications.
    #[serde(default = "default_target")]
    pub default_target: String,
    #[serde(default = "default_swap")]
    pub default_swap: String,
    /// Form fragment retargeted when a form is replaced.
    #[serde(default = "default_form_target")]
    pub form_target: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            store_expiry_seconds: default_hour(),
            heartbeat_interval: default_heartbeat(),
            tick_interval_ms: default_tick(),
            max_connection_seconds: default_hour(),
            channel_capacity: default_channel_capacity(),
            default_duration_ms: default_duration(),
            default_position: default_position(),
            default_target: default_target(),
            default_swap: default_swap(),
            form_target: default_form_target(),
        }
    }
}

impl NotificationConfig {
    pub fn store_expiry(&self) -> Duration {
        Duration::from_secs(self.store_expiry_seconds)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn max_connection(&self) -> Duration {
        Duration::from_secs(self.max_connection_seconds)
    }
}

fn default_hour() -> u64 {
    3600
}

fn default_heartbeat() -> u64 {
    15
}

fn default_tick() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    64
}

fn default_duration() -> u64 {
    5000
}

fn default_position() -> String {
    "top-right".to_string()
}

fn default_target() -> String {
    ".notifications-init".to_string()
}

fn default_swap() -> String {
    "none".to_string()
}

fn default_form_target() -> String {
    ".fragment--form".to_string()
}
