use crate::{LocalStorage, Storage, StorageResult};
use dicomflow_core::Config;
use std::sync::Arc;

/// Create the storage backend described by the configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    tracing::info!(path = %config.storage_path(), "Initializing local storage");
    let storage = LocalStorage::new(config.storage_path()).await?;
    Ok(Arc::new(storage))
}
