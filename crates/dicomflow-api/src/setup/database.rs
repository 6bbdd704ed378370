//! PostgreSQL pool and schema migrations

use anyhow::{Context, Result};
use dicomflow_core::Config;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connect to PostgreSQL and bring the schema up to date.
pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = pool_options(config)
        .connect(config.database_url())
        .await
        .context("Failed to connect to PostgreSQL")?;
    tracing::info!(
        max_connections = config.db_max_connections(),
        acquire_timeout_secs = config.db_timeout_seconds(),
        "PostgreSQL pool ready"
    );

    apply_migrations(&pool).await?;
    Ok(pool)
}

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(10 * 60))
        .max_lifetime(Duration::from_secs(30 * 60))
}

fn migrations_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations")
}

/// Versions already recorded in `_sqlx_migrations` are skipped.
async fn apply_migrations(pool: &PgPool) -> Result<()> {
    let dir = migrations_dir();
    let migrator = Migrator::new(dir.as_path())
        .await
        .with_context(|| format!("Failed to load migrations from {}", dir.display()))?;
    migrator
        .run(pool)
        .await
        .context("Failed to apply schema migrations")?;
    tracing::info!(known = migrator.iter().count(), "Schema migrations applied");
    Ok(())
}
