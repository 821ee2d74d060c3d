//! Route definitions for the pipeline HTTP API.
//!
//! The router receives `AppState` and passes it to all handlers via Axum's
//! `State` extractor. Long-lived SSE routes are kept out of the request
//! timeout.

use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::middleware::cors::build_cors_layer;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let timeout =
        TimeoutLayer::new(Duration::from_secs(state.config.server.request_timeout_seconds));

    let bounded = Router::new()
        .merge(health_routes())
        .merge(token_routes())
        .merge(list_routes())
        .merge(service_routes())
        .route("/notifications/pending", get(handlers::notification::pending))
        .layer(timeout.clone());

    // `GET /notifications` opens a stream when no message is given.
    let streaming = Router::new()
        .route("/notifications/stream", get(handlers::notification::stream))
        .route(
            "/notifications",
            get(handlers::notification::notify)
                .merge(post(handlers::notification::send).layer(timeout)),
        );

    let cors = build_cors_layer(&state.config.server.cors);

    Router::new()
        .merge(bounded)
        .merge(streaming)
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(axum_middleware::from_fn(middleware::flash::flash_messages))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Liveness and dependency health
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

/// Action token issuing and revocation
fn token_routes() -> Router<AppState> {
    Router::new()
        .route("/tokens", post(handlers::token::issue))
        .route("/tokens/revoke", post(handlers::token::revoke))
}

/// Paginated entity lists
fn list_routes() -> Router<AppState> {
    Router::new()
        .route("/people", get(handlers::list::list_people))
        .route("/tags", get(handlers::list::list_tags))
}

/// Registry-backed service dispatch
fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/services", get(handlers::service::list_services))
        .route("/services/{name}/{operation}", post(handlers::service::run_operation))
}
