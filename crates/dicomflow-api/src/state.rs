//! Application state and sub-state extractors.
//!
//! Handlers extract only the sub-state they need through axum's `FromRef`.

use axum::extract::FromRef;
use dicomflow_core::Config;
use dicomflow_db::{
    ChunkSessionRepository, MedicalFileRepository, UploadBatchRepository, UserRepository,
};
use dicomflow_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

/// Repositories behind trait objects so tests can swap in the in-memory ones
#[derive(Clone)]
pub struct RepositoryState {
    pub medical_files: Arc<dyn MedicalFileRepository>,
    pub upload_batches: Arc<dyn UploadBatchRepository>,
    pub chunk_sessions: Arc<dyn ChunkSessionRepository>,
    pub users: Arc<dyn UserRepository>,
}

/// Limits enforced by the upload routes
#[derive(Clone, Debug)]
pub struct UploadLimits {
    /// Largest accepted multipart part (chunk or whole file)
    pub max_part_bytes: u64,
    pub max_files_per_request: usize,
    /// Per-file cap of `POST /dicom/upload`
    pub max_single_upload_bytes: u64,
}

impl UploadLimits {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_part_bytes: config.max_chunk_file_size_bytes(),
            max_files_per_request: config.max_files_per_request(),
            max_single_upload_bytes: config.max_single_upload_size_bytes(),
        }
    }

    /// Read limit for one file part of a whole-file upload
    pub fn single_file_part_bytes(&self) -> u64 {
        self.max_single_upload_bytes.min(self.max_part_bytes)
    }
}

/// Storage backend plus the limits that apply when writing to it
#[derive(Clone)]
pub struct UploadState {
    pub storage: Arc<dyn Storage>,
    pub limits: UploadLimits,
}

#[derive(Clone)]
pub struct AppState {
    pub repos: RepositoryState,
    pub upload: UploadState,
    /// `None` when running against in-memory repositories
    pub pool: Option<PgPool>,
}

impl FromRef<Arc<AppState>> for RepositoryState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.repos.clone()
    }
}

impl FromRef<Arc<AppState>> for UploadState {
    fn from_ref(state: &Arc<AppState>) -> Self {
        state.upload.clone()
    }
}
