//! Notification delivery for HTTP handlers.
//!
//! [`Notifier::show_notification`] picks the channel from the shape of the
//! request: an SSE stream, a single SSE frame, HTMX response headers, or
//! a flash message (optionally followed by a redirect).

pub mod notifier;
pub mod options;
pub mod request;

pub use notifier::Notifier;
pub use options::NotifyOptions;
pub use request::NotifyRequest;
