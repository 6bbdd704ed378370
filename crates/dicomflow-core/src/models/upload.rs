use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::MedicalFileResponse;

/// Body of `POST /dicom/folder-structure`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFolderStructureRequest {
    pub patient_id: Uuid,
    /// Distinct folder paths of the upload, relative to the dropped root.
    /// The empty string stands for the root itself.
    #[validate(length(min = 1, max = 10000, message = "Structure must list between 1 and 10000 folders"))]
    pub structure: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFolderStructureResponse {
    /// Order id minted for this upload; every chunk of the batch carries it.
    pub order_id: Uuid,
    pub structure: Vec<String>,
}

/// Folder structure registered ahead of a chunked folder upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UploadBatch {
    pub order_id: Uuid,
    pub uploaded_by: Uuid,
    pub patient_id: Uuid,
    pub folder_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadBatch {
    pub fn contains_folder(&self, folder_path: &str) -> bool {
        self.folder_paths.iter().any(|p| p == folder_path)
    }
}

/// Server-side reassembly state of one file arriving in chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ChunkSession {
    pub file_id: String,
    pub uploaded_by: Uuid,
    pub order_id: Uuid,
    pub file_name: String,
    pub folder_path: String,
    pub total_chunks: i32,
    pub received_chunks: i32,
    pub received_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChunkSession {
    pub fn is_complete(&self) -> bool {
        self.received_chunks >= self.total_chunks
    }

    /// Staging key of one chunk; zero-padded so keys sort in index order.
    pub fn chunk_key(&self, index: i32) -> String {
        format!(
            "chunks/{}/{}/{:06}",
            self.uploaded_by,
            sanitize_key_segment(&self.file_id),
            index
        )
    }

    pub fn chunk_keys(&self) -> Vec<String> {
        (0..self.total_chunks).map(|i| self.chunk_key(i)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct NewChunkSession {
    pub file_id: String,
    pub uploaded_by: Uuid,
    pub order_id: Uuid,
    pub file_name: String,
    pub folder_path: String,
    pub total_chunks: i32,
}

/// Acknowledgement of one chunk
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReceipt {
    pub file_id: String,
    pub chunk_index: i32,
    pub received_chunks: i32,
    pub total_chunks: i32,
    /// Set once the last chunk arrived and the file was assembled
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<Uuid>,
}

/// Response of `POST /dicom/upload`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub order_id: Uuid,
    pub files: Vec<MedicalFileResponse>,
}

/// Keep storage key segments to a safe character set.
pub fn sanitize_key_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // ".." would survive the character filter
    let cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
