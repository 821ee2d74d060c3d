//! Pipeline server: HTMX-aware notifications, SSE streams and cached
//! CRUD services over a pluggable entity store.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use pipeline_api::{Stores, build_app, build_state};
use pipeline_cache::CacheManager;
use pipeline_core::config::AppConfig;
use pipeline_core::error::AppError;
use pipeline_database::{DatabasePool, MemoryStore, PgStore};
use pipeline_entity::{Person, Tag};

#[tokio::main]
async fn main() {
    let env = std::env::var("PIPELINE_ENV").unwrap_or_else(|_| "development".to_string());
    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Entity stores for the configured backend, plus the pool to close on
/// shutdown when PostgreSQL is used.
async fn open_stores(config: &AppConfig) -> Result<(Stores, Option<DatabasePool>), AppError> {
    if !config.database.is_postgres() {
        tracing::info!("Using in-memory entity stores");
        let stores = Stores {
            people: Arc::new(MemoryStore::<Person>::new()),
            tags: Arc::new(MemoryStore::<Tag>::new()),
        };
        return Ok((stores, None));
    }

    let db = DatabasePool::connect(&config.database).await?;
    if config.database.run_migrations {
        pipeline_database::migration::run_migrations(db.pool()).await?;
    }
    if let Err(e) = db.log_contents().await {
        tracing::warn!("Could not read entity store contents: {}", e);
    }

    let stores = Stores {
        people: Arc::new(PgStore::<Person>::new(db.pool().clone())),
        tags: Arc::new(PgStore::<Tag>::new(db.pool().clone())),
    };
    Ok((stores, Some(db)))
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting pipeline server v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Entity stores ────────────────────────────────────
    let (stores, db) = open_stores(&config).await?;

    // ── Step 2: Cache ────────────────────────────────────────────
    tracing::info!("Initializing cache (provider: {})...", config.cache.provider);
    let cache = CacheManager::new(&config.cache).await?;

    // ── Step 3: State and router ─────────────────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config, stores, cache);
    let app = build_app(state);

    // ── Step 4: Serve ────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    if let Some(db) = db {
        db.close().await;
    }

    tracing::info!("Pipeline server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
