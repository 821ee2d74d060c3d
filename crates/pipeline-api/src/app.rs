//! Dependency wiring for the HTTP application.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use tracing::info;

use pipeline_auth::TokenService;
use pipeline_cache::{CacheManager, ModelCache};
use pipeline_core::config::AppConfig;
use pipeline_core::traits::{EntityStore, TokenValidator};
use pipeline_entity::{Person, Tag};
use pipeline_realtime::{NotificationHub, NotificationStore};
use pipeline_service::{
    BaseManager, BatchCrudService, CrudService, SearchService, ServiceRegistry, TokenAwareManager,
    TokenProtectedService,
};

use crate::notify::Notifier;
use crate::router::build_router;
use crate::state::AppState;

/// Entity stores the application runs on.
#[derive(Clone)]
pub struct Stores {
    pub people: Arc<dyn EntityStore<Person>>,
    pub tags: Arc<dyn EntityStore<Tag>>,
}

/// Build the shared state: managers, registered services, token service
/// and the notification hub.
pub fn build_state(config: AppConfig, stores: Stores, cache: CacheManager) -> AppState {
    let timeouts = &config.cache.timeouts;
    let model_ttl = Duration::from_secs(timeouts.model_ttl_seconds);

    let tokens = TokenService::new(&config.auth, cache.clone());
    let people = BaseManager::new(stores.people);
    let tags = BaseManager::new(stores.tags);

    let services = ServiceRegistry::new();
    services.register(Arc::new(BatchCrudService::new(
        CrudService::new("people", people.clone())
            .with_cache(ModelCache::new(cache.clone(), model_ttl)),
    )));
    services.register(Arc::new(BatchCrudService::new(CrudService::new("tags", tags.clone()))));
    services.register(Arc::new(SearchService::new("people_search", people.clone()).with_cache(
        ModelCache::new(cache.clone(), model_ttl),
        Duration::from_secs(timeouts.search_ttl_seconds),
    )));

    let validator: Arc<dyn TokenValidator> = Arc::new(tokens.clone());
    services.register(Arc::new(TokenProtectedService::new(
        "people_protected",
        TokenAwareManager::new(
            people.clone(),
            validator,
            cache.clone(),
            Duration::from_secs(timeouts.token_ttl_seconds),
        ),
    )));
    services.register(Arc::new(tokens.clone()));

    let store = Arc::new(NotificationStore::from_config(&config.notifications));
    let hub = Arc::new(NotificationHub::from_config(store, &config.notifications));
    let notifier = Notifier::new(config.notifications.clone(), hub.clone());

    info!(services = ?services.names(), "Application state ready");

    AppState {
        config: Arc::new(config),
        cache,
        tokens,
        services,
        people,
        tags,
        hub,
        notifier,
        started_at: Instant::now(),
    }
}

/// Build the complete application router.
pub fn build_app(state: AppState) -> Router {
    build_router(state)
}
