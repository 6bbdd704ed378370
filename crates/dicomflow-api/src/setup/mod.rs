//! Application setup and initialization

pub mod database;
pub mod routes;
pub mod server;
pub mod storage;

use crate::services::sweep::ChunkSweeper;
use crate::state::{AppState, RepositoryState, UploadLimits, UploadState};
use anyhow::{Context, Result};
use dicomflow_core::Config;
use dicomflow_db::{
    PgChunkSessionRepository, PgMedicalFileRepository, PgUploadBatchRepository, PgUserRepository,
};
use dicomflow_infra::{init_telemetry, LogFormat};
use std::sync::Arc;

const DEFAULT_LOG_FILTER: &str = "dicomflow_api=debug,dicomflow_db=debug,dicomflow_storage=debug,tower_http=debug,sqlx=warn";

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    config
        .validate()
        .context("Configuration validation failed")?;

    init_telemetry(DEFAULT_LOG_FILTER, LogFormat::from_env());

    tracing::info!(
        environment = %config.environment(),
        "Configuration loaded and validated successfully"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;

    let state = Arc::new(AppState {
        repos: RepositoryState {
            medical_files: Arc::new(PgMedicalFileRepository::new(pool.clone())),
            upload_batches: Arc::new(PgUploadBatchRepository::new(pool.clone())),
            chunk_sessions: Arc::new(PgChunkSessionRepository::new(pool.clone())),
            users: Arc::new(PgUserRepository::new(pool.clone())),
        },
        upload: UploadState {
            storage,
            limits: UploadLimits::from_config(&config),
        },
        pool: Some(pool),
    });

    ChunkSweeper::new(
        state.repos.chunk_sessions.clone(),
        state.upload.storage.clone(),
    )
    .start();
    tracing::info!("Started abandoned chunk session sweep (runs every hour)");

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
