use crate::auth::CallerContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::upload as upload_service;
use crate::state::RepositoryState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use dicomflow_core::models::{RegisterFolderStructureRequest, RegisterFolderStructureResponse};

/// Register the folder structure of a folder upload and mint its order id
#[utoipa::path(
    post,
    path = "/dicom/folder-structure",
    tag = "uploads",
    request_body = RegisterFolderStructureRequest,
    responses(
        (status = 201, description = "Structure registered", body = RegisterFolderStructureResponse),
        (status = 400, description = "Invalid folder path", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a doctor", body = ErrorResponse),
        (status = 404, description = "Patient not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos, request),
    fields(user_id = %caller.user_id, operation = "register_folder_structure")
)]
pub async fn register_folder_structure(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    ValidatedJson(request): ValidatedJson<RegisterFolderStructureRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_doctor()?;

    let response =
        upload_service::register_folder_structure(&repos, caller.user_id, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}
