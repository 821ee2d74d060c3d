//! Schema setup for the `records` table.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use tracing::info;

use pipeline_core::error::{AppError, ErrorKind};
use pipeline_core::result::AppResult;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// Apply pending migrations, then check that `records` is in place.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!(
        table = "records",
        known = MIGRATOR.iter().count(),
        "Migrating entity store"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to migrate records table: {e}"),
            e,
        )
    })?;

    let present: bool = sqlx::query_scalar("SELECT to_regclass('records') IS NOT NULL")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to inspect schema", e))?;
    if !present {
        return Err(AppError::new(
            ErrorKind::Database,
            "Migrations ran but the records table is missing",
        ));
    }

    info!(table = "records", "Entity store schema is current");
    Ok(())
}
