//! Storage abstraction trait
//!
//! The upload routes talk to blob storage only through [`Storage`], so the backend
//! can be swapped without touching the handlers.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key`, replacing any previous object
    async fn put(&self, storage_key: &str, data: Bytes) -> StorageResult<()>;

    /// Read a whole object
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete an object; deleting a missing key succeeds
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Concatenate `parts` in order into `dest_key` without buffering whole parts
    /// in memory; returns the total size. The parts are left in place.
    async fn concat(&self, parts: &[String], dest_key: &str) -> StorageResult<u64>;
}
