//! Custom Axum extractors.

pub mod htmx;
pub mod user;

pub use htmx::HtmxRequest;
pub use user::CurrentUser;
