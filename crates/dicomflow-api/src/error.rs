//! Rendering of [`AppError`] as HTTP responses.
//!
//! Handlers return `Result<_, HttpAppError>`; `?` converts core, storage,
//! multipart and JSON failures alike.

use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dicomflow_core::{AppError, ErrorMetadata, LogLevel};
use dicomflow_storage::StorageError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Body of every non-2xx response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    /// Source chain; omitted in production and for server faults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub code: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

impl ErrorResponse {
    pub fn from_app_error(err: &AppError, expose_details: bool) -> Self {
        let expose = expose_details && !err.is_sensitive();
        Self {
            error: err.client_message(),
            details: expose.then(|| err.detailed_message()),
            error_type: expose.then(|| err.error_type().to_string()),
            code: err.error_code().to_string(),
            recoverable: err.is_recoverable(),
            suggested_action: err.suggested_action().map(str::to_string),
        }
    }
}

#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError(err.into())
    }
}

impl From<JsonRejection> for HttpAppError {
    fn from(rejection: JsonRejection) -> Self {
        HttpAppError(AppError::InvalidInput(format!(
            "Invalid request body: {}",
            rejection.body_text()
        )))
    }
}

impl From<MultipartError> for HttpAppError {
    fn from(err: MultipartError) -> Self {
        HttpAppError(AppError::BadRequest(format!(
            "Invalid multipart request: {}",
            err.body_text()
        )))
    }
}

impl From<StorageError> for HttpAppError {
    fn from(err: StorageError) -> Self {
        HttpAppError(match err {
            StorageError::NotFound(key) => {
                tracing::debug!(%key, "Stored object missing");
                AppError::NotFound("Stored file not found".to_string())
            }
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::IoError(io) => AppError::Storage(io.to_string()),
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::BackendError(msg) => AppError::Storage(msg),
        })
    }
}

/// JSON body that must also pass its `validator` rules. Either failure is a
/// 400 `INVALID_INPUT`.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = HttpAppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state).await?;
        body.validate().map_err(AppError::from)?;
        Ok(ValidatedJson(body))
    }
}

fn production() -> bool {
    std::env::var("ENVIRONMENT")
        .or_else(|_| std::env::var("APP_ENV"))
        .map(|env| matches!(env.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let HttpAppError(err) = self;
        let code = err.error_code();
        let kind = err.error_type();
        match err.log_level() {
            LogLevel::Debug => tracing::debug!(error = %err, code, kind, "Request rejected"),
            LogLevel::Warn => tracing::warn!(error = %err, code, kind, "Request failed"),
            LogLevel::Error => tracing::error!(error = ?err, code, kind, "Request failed"),
        }

        let status = StatusCode::from_u16(err.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::from_app_error(&err, !production()))).into_response()
    }
}
