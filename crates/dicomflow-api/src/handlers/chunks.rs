use super::multipart::{parse_field, read_part_limited, read_text};
use crate::auth::CallerContext;
use crate::constants::CHUNK_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::upload::{self as upload_service, ChunkUpload};
use crate::state::{RepositoryState, UploadState};
use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use dicomflow_core::models::ChunkReceipt;
use dicomflow_core::AppError;
use uuid::Uuid;

#[derive(Default)]
struct ChunkForm {
    chunk: Option<Bytes>,
    file_id: Option<String>,
    chunk_index: Option<String>,
    total_chunks: Option<String>,
    order_id: Option<String>,
    file_name: Option<String>,
    folder_path: Option<String>,
}

impl ChunkForm {
    async fn read(mut multipart: Multipart, max_part_bytes: u64) -> Result<Self, HttpAppError> {
        let mut form = ChunkForm::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                CHUNK_FIELD => {
                    if form.chunk.is_some() {
                        return Err(AppError::BadRequest(
                            "Exactly one 'chunk' part is allowed".to_string(),
                        )
                        .into());
                    }
                    form.chunk = Some(read_part_limited(field, max_part_bytes).await?);
                }
                "fileId" => form.file_id = Some(read_text(field).await?),
                "chunkIndex" => form.chunk_index = Some(read_text(field).await?),
                "totalChunks" => form.total_chunks = Some(read_text(field).await?),
                "orderId" => form.order_id = Some(read_text(field).await?),
                "fileName" => form.file_name = Some(read_text(field).await?),
                "folderPath" => form.folder_path = Some(read_text(field).await?),
                other => {
                    tracing::debug!(field = %other, "Ignoring unknown multipart field");
                }
            }
        }

        Ok(form)
    }

    fn into_chunk(self) -> Result<ChunkUpload, AppError> {
        Ok(ChunkUpload {
            data: self
                .chunk
                .ok_or_else(|| AppError::InvalidInput("Missing 'chunk' part".to_string()))?,
            file_id: self
                .file_id
                .ok_or_else(|| AppError::InvalidInput("Missing field 'fileId'".to_string()))?,
            chunk_index: parse_field::<i32>("chunkIndex", self.chunk_index)?,
            total_chunks: parse_field::<i32>("totalChunks", self.total_chunks)?,
            order_id: parse_field::<Uuid>("orderId", self.order_id)?,
            file_name: self
                .file_name
                .ok_or_else(|| AppError::InvalidInput("Missing field 'fileName'".to_string()))?,
            // Files at the root of the drop have no folder
            folder_path: self.folder_path.unwrap_or_default(),
        })
    }
}

/// Receive one chunk of a folder upload
///
/// Chunks of a file must arrive in index order. The last chunk assembles the file
/// and creates its medical file record.
#[utoipa::path(
    post,
    path = "/dicom/chunks",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Chunk accepted", body = ChunkReceipt),
        (status = 400, description = "Invalid chunk", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a doctor", body = ErrorResponse),
        (status = 404, description = "Order or upload not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos, upload, multipart),
    fields(user_id = %caller.user_id, operation = "upload_chunk")
)]
pub async fn upload_chunk(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    State(upload): State<UploadState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_doctor()?;

    let chunk = ChunkForm::read(multipart, upload.limits.max_part_bytes)
        .await?
        .into_chunk()?;
    let receipt = upload_service::receive_chunk(&repos, &upload, caller.user_id, chunk).await?;

    Ok(Json(receipt))
}
