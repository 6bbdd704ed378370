use anyhow::{Context, Result};
use dicomflow_core::Config;
use dicomflow_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(path = %config.storage_path(), "Local storage ready");
    Ok(storage)
}
