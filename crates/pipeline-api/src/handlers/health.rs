//! Health check handlers.

use axum::Json;
use axum::extract::State;

use pipeline_core::traits::CacheProvider;

use crate::dto::response::{DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// GET /health/detailed
pub async fn health_detailed(State(state): State<AppState>) -> Json<DetailedHealthResponse> {
    let cache = match state.cache.health_check().await {
        Ok(true) => "connected",
        _ => "unavailable",
    };

    Json(DetailedHealthResponse {
        status: if cache == "connected" { "ok" } else { "degraded" }.to_string(),
        cache: cache.to_string(),
        services: state.services.names(),
        online_users: state.hub.online_count(),
        stored_notifications: state.hub.store().len(),
    })
}
