//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! `config/default.toml`, an optional environment overlay, and `PIPELINE__*`
//! environment variables. Each sub-module is one configuration section.

pub mod app;
pub mod auth;
pub mod cache;
pub mod logging;
pub mod notification;
pub mod pagination;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::auth::AuthConfig;
use self::cache::CacheConfig;
use self::logging::LoggingConfig;
use self::notification::NotificationConfig;
use self::pagination::PaginationConfig;

use crate::error::AppError;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Entity store settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings and cache timeouts.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Token signing settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Notification store and SSE stream settings.
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// List pagination defaults.
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Entity store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Store backend: `"memory"` or `"postgres"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// PostgreSQL connection URL (only read by the `postgres` backend).
    #[serde(default = "default_url")]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Run embedded migrations at startup.
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: default_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            run_migrations: default_true(),
        }
    }
}

impl DatabaseConfig {
    /// Whether the PostgreSQL backend is selected.
    pub fn is_postgres(&self) -> bool {
        self.backend.eq_ignore_ascii_case("postgres")
    }
}

impl AppConfig {
    /// Load configuration for the given environment name.
    ///
    /// Merges `config/default`, `config/{env}` and environment variables
    /// prefixed with `PIPELINE` (nested keys separated by `__`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PIPELINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_url() -> String {
    "postgres://localhost:5432/pipeline".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
