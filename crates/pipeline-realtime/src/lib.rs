//! # pipeline-realtime
//!
//! Server-push notifications for the pipeline workspace. Provides:
//!
//! - The [`Notification`] value object and its SSE / HTMX encodings
//! - A per-user, in-process [`NotificationStore`] with time-based expiry
//! - A [`NotificationHub`] that delivers live over per-user channels and
//!   falls back to the store for users without an open stream
//! - The async SSE [`NotificationStream`] with heartbeats and a
//!   connection time cap
//!
//! The store is process-local. Several server processes each keep their
//! own store and hub, so a notification is only seen by streams connected
//! to the process that published it.

pub mod hub;
pub mod notification;
pub mod store;
pub mod stream;

pub use hub::{Delivery, NotificationHub};
pub use notification::{Notification, NotificationLevel, SseEvent};
pub use store::NotificationStore;
pub use stream::{NotificationStream, StreamSettings};
