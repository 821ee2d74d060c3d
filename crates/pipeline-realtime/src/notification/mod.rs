//! Notification value objects and their wire encodings.

pub mod event;
pub mod model;

pub use event::SseEvent;
pub use model::{Notification, NotificationLevel};
