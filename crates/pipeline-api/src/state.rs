//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use pipeline_auth::TokenService;
use pipeline_cache::CacheManager;
use pipeline_core::config::AppConfig;
use pipeline_entity::{Person, Tag};
use pipeline_realtime::NotificationHub;
use pipeline_service::{BaseManager, ServiceRegistry};

use crate::notify::Notifier;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`. Every field is a
/// handle, so cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    pub config: Arc<AppConfig>,

    // ── Infrastructure ───────────────────────────────────────
    pub cache: CacheManager,
    pub tokens: TokenService,

    // ── Services ─────────────────────────────────────────────
    /// Named services reachable through `/services/{name}/{operation}`.
    pub services: ServiceRegistry,
    pub people: BaseManager<Person>,
    pub tags: BaseManager<Tag>,

    // ── Notifications ────────────────────────────────────────
    pub hub: Arc<NotificationHub>,
    pub notifier: Notifier,

    pub started_at: Instant,
}
