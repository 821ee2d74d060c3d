//! CORS layer configuration.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use pipeline_core::config::app::CorsConfig;

/// HTMX request headers a cross-origin page may send.
const HTMX_REQUEST_HEADERS: [&str; 6] = [
    "hx-request",
    "hx-trigger",
    "hx-trigger-name",
    "hx-target",
    "hx-current-url",
    "hx-boosted",
];

/// HTMX response headers exposed to cross-origin scripts.
const HTMX_RESPONSE_HEADERS: [&str; 7] = [
    "hx-trigger",
    "hx-redirect",
    "hx-reswap",
    "hx-retarget",
    "hx-push-url",
    "hx-swap",
    "hx-target",
];

/// Builds a CORS tower layer from configuration.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new().allow_methods([
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ]);

    if config.allowed_origins.iter().any(|o| o == "*") {
        layer = layer.allow_origin(Any).allow_headers(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        let mut headers: Vec<HeaderName> = HTMX_REQUEST_HEADERS
            .iter()
            .map(|h| HeaderName::from_static(*h))
            .collect();
        headers.extend([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ]);
        layer = layer.allow_origin(origins).allow_headers(headers);
    }

    layer
        .expose_headers(
            HTMX_RESPONSE_HEADERS
                .iter()
                .map(|h| HeaderName::from_static(*h))
                .collect::<Vec<_>>(),
        )
        .max_age(Duration::from_secs(config.max_age_seconds))
}
