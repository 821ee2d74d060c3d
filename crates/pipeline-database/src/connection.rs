//! PostgreSQL pool for the JSONB `records` store.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use pipeline_core::config::DatabaseConfig;
use pipeline_core::error::{AppError, ErrorKind};
use pipeline_core::result::AppResult;

/// Stored document count for one model.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ModelCount {
    pub model: String,
    pub documents: i64,
}

/// Pool shared by every [`PgStore`](crate::PgStore) of the process.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool for the `postgres` backend.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        if !config.is_postgres() {
            return Err(AppError::configuration(format!(
                "Backend '{}' does not use a database pool",
                config.backend
            )));
        }
        info!(
            backend = %config.backend,
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting entity store"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect entity store: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Documents per model in the `records` table, ordered by model.
    pub async fn model_counts(&self) -> AppResult<Vec<ModelCount>> {
        sqlx::query_as::<_, ModelCount>(
            "SELECT model, COUNT(*) AS documents FROM records GROUP BY model ORDER BY model",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count records", e))
    }

    /// Log what the store holds, e.g. `person=3 tag=1`.
    pub async fn log_contents(&self) -> AppResult<()> {
        let counts = self.model_counts().await?;
        info!(models = counts.len(), contents = %describe_counts(&counts), "Entity store ready");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Entity store pool closed");
    }
}

pub(crate) fn describe_counts(counts: &[ModelCount]) -> String {
    if counts.is_empty() {
        return "empty".to_string();
    }
    counts
        .iter()
        .map(|c| format!("{}={}", c.model, c.documents))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hide the password of a connection URL.
fn mask_password(url: &str) -> String {
    let Some(at_pos) = url.find('@') else {
        return url.to_string();
    };
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url[..at_pos].rfind(':') {
        Some(colon_pos) if colon_pos > scheme_end => {
            format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..])
        }
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            mask_password("postgres://app:secret@db:5432/pipeline"),
            "postgres://app:****@db:5432/pipeline"
        );
        assert_eq!(
            mask_password("postgres://app@db:5432/pipeline"),
            "postgres://app@db:5432/pipeline"
        );
        assert_eq!(
            mask_password("postgres://localhost:5432/pipeline"),
            "postgres://localhost:5432/pipeline"
        );
    }

    #[test]
    fn test_describe_counts() {
        assert_eq!(describe_counts(&[]), "empty");
        let counts = [
            ModelCount { model: "person".into(), documents: 3 },
            ModelCount { model: "tag".into(), documents: 1 },
        ];
        assert_eq!(describe_counts(&counts), "person=3 tag=1");
    }

    #[tokio::test]
    async fn test_memory_backend_has_no_pool() {
        let config = DatabaseConfig::default();
        let err = DatabasePool::connect(&config).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }
}
