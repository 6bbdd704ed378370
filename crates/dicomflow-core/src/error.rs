//! Server-side error type.
//!
//! Every failure of an upload, order or collaborator operation ends up as an
//! [`AppError`]. The HTTP layer never matches on variants itself; it asks the
//! error how to present itself through [`ErrorMetadata`].
//!
//! Without the `sqlx` feature (the HTTP client build) `Database` carries a plain
//! message.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Level at which the HTTP layer logs an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warn,
    Error,
}

/// How an error is shown to API clients
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable machine-readable code, e.g. `NOT_FOUND`
    fn error_code(&self) -> &'static str;

    /// Whether the same request may succeed if sent again
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    fn client_message(&self) -> String;

    /// Sensitive errors never expose their message or source chain
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    /// Writing chunks, assembling files or removing them on disk
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Fixed presentation of one variant
struct Presentation {
    status: u16,
    code: &'static str,
    recoverable: bool,
    action: Option<&'static str>,
    sensitive: bool,
    level: LogLevel,
}

const SERVER_FAULT: Presentation = Presentation {
    status: 500,
    code: "INTERNAL_ERROR",
    recoverable: true,
    action: Some("Retry after a short delay"),
    sensitive: true,
    level: LogLevel::Error,
};

const fn client_fault(status: u16, code: &'static str, action: &'static str) -> Presentation {
    Presentation {
        status,
        code,
        recoverable: false,
        action: Some(action),
        sensitive: false,
        level: LogLevel::Debug,
    }
}

impl AppError {
    fn presentation(&self) -> Presentation {
        match self {
            AppError::Database(_) => Presentation {
                code: "DATABASE_ERROR",
                ..SERVER_FAULT
            },
            AppError::Storage(_) => Presentation {
                code: "STORAGE_ERROR",
                ..SERVER_FAULT
            },
            AppError::Internal(_) | AppError::InternalWithSource { .. } => SERVER_FAULT,
            AppError::InvalidInput(_) => client_fault(
                400,
                "INVALID_INPUT",
                "Check request parameters and try again",
            ),
            AppError::BadRequest(_) => {
                client_fault(400, "BAD_REQUEST", "Check the multipart fields and their values")
            }
            AppError::NotFound(_) => {
                client_fault(404, "NOT_FOUND", "Verify the order or file ID exists")
            }
            AppError::PayloadTooLarge(_) => client_fault(
                413,
                "PAYLOAD_TOO_LARGE",
                "Use the chunked folder upload for files over 100 MiB",
            ),
            AppError::Unauthorized(_) => {
                client_fault(401, "UNAUTHORIZED", "Sign in again and resend with the new token")
            }
            AppError::Forbidden(_) => client_fault(
                403,
                "FORBIDDEN",
                "Only doctors may upload or manage orders",
            ),
        }
    }

    /// Variant name, shown to clients outside production
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Display text followed by up to five `Caused by:` lines.
    pub fn detailed_message(&self) -> String {
        const MAX_CAUSES: usize = 5;

        let mut details = self.to_string();
        let causes: Vec<_> =
            std::iter::successors(std::error::Error::source(self), |e| e.source()).collect();
        for cause in causes.iter().take(MAX_CAUSES) {
            details.push_str("\n  Caused by: ");
            details.push_str(&cause.to_string());
        }
        if causes.len() > MAX_CAUSES {
            details.push_str("\n  ... (truncated)");
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.presentation().status
    }

    fn error_code(&self) -> &'static str {
        self.presentation().code
    }

    fn is_recoverable(&self) -> bool {
        self.presentation().recoverable
    }

    fn suggested_action(&self) -> Option<&'static str> {
        self.presentation().action
    }

    fn is_sensitive(&self) -> bool {
        self.presentation().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.presentation().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access order records".to_string(),
            AppError::Storage(_) => "Failed to access file storage".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::InvalidInput(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::PayloadTooLarge(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg) => msg.clone(),
        }
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: format!("{:#}", err),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("Malformed JSON: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Malformed UUID: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}
