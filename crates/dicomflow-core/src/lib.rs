//! dicomflow core library
//!
//! Domain models, error types, configuration, and the DICOM file validator shared
//! by the server, the HTTP client, and the CLI.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, ServerConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use validation::dicom::{validate_dicom, HeaderProbe, UploadLimit, ValidationResult};
