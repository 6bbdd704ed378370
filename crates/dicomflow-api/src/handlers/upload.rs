use super::multipart::{parse_field, read_part_limited, read_text};
use crate::auth::CallerContext;
use crate::constants::{FILES_FIELD, FILES_FIELD_ARRAY};
use crate::error::{ErrorResponse, HttpAppError};
use crate::services::upload::{self as upload_service, IncomingFile};
use crate::state::{RepositoryState, UploadState};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use dicomflow_core::models::UploadResponse;
use dicomflow_core::AppError;
use uuid::Uuid;

/// Upload whole DICOM files in one request under a new order
///
/// Part file names may carry a relative path (`A/B/2.dcm`); its parent becomes the
/// record's folder path. A part over the single-file cap is rejected while it
/// streams in.
#[utoipa::path(
    post,
    path = "/dicom/upload",
    tag = "uploads",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Files stored", body = UploadResponse),
        (status = 400, description = "Invalid files or limits exceeded", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a doctor", body = ErrorResponse),
        (status = 404, description = "Patient not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos, upload, multipart),
    fields(user_id = %caller.user_id, operation = "upload_files")
)]
pub async fn upload_files(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    State(upload): State<UploadState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_doctor()?;

    let mut files: Vec<IncomingFile> = Vec::new();
    let mut patient_id: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILES_FIELD | FILES_FIELD_ARRAY => {
                if files.len() >= upload.limits.max_files_per_request {
                    return Err(AppError::BadRequest(format!(
                        "Too many files: at most {} per request",
                        upload.limits.max_files_per_request
                    ))
                    .into());
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data =
                    read_part_limited(field, upload.limits.single_file_part_bytes()).await?;
                files.push(IncomingFile { file_name, data });
            }
            "patientId" => patient_id = Some(read_text(field).await?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown multipart field");
            }
        }
    }

    let patient_id = parse_field::<Uuid>("patientId", patient_id)?;
    let response =
        upload_service::upload_files(&repos, &upload, caller.user_id, patient_id, files).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
