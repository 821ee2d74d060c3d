//! # pipeline-api
//!
//! HTTP layer for the pipeline workspace built on Axum.
//!
//! Provides the HTMX-aware notification responses ([`notify::Notifier`]),
//! cookie-backed flash messages, the SSE notification stream, paginated
//! list endpoints with HTMX fragment responses, token issuing, generic
//! service dispatch through the registry, and the error-to-status mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod pagination;
pub mod router;
pub mod state;

pub use app::{Stores, build_app, build_state};
pub use error::ApiError;
pub use state::AppState;
