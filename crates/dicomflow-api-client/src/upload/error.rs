use std::path::PathBuf;
use thiserror::Error;

/// Terminal failure of a folder upload
#[derive(Debug, Error)]
pub enum UploadError {
    /// One or more files were rejected before anything was sent
    #[error("{}", validation_message(.0))]
    Validation(Vec<String>),

    #[error("Failed to register folder structure: {0}")]
    Registration(String),

    #[error("Upload of {file} failed: {message}")]
    Transport { file: String, message: String },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UploadError {
    /// Whether running the failed step again could succeed. Validation failures
    /// and cancellations are final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::Registration(_) | UploadError::Transport { .. } | UploadError::Io { .. }
        )
    }
}

fn validation_message(reasons: &[String]) -> String {
    let mut message = format!("{} file(s) failed validation:", reasons.len());
    for reason in reasons {
        message.push_str("\n - ");
        message.push_str(reason);
    }
    message
}
