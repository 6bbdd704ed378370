//! dicomflow infrastructure library
//!
//! Shared pieces of the HTTP service that are not specific to DICOM uploads:
//! - Middleware (request ID, security headers)
//! - Tracing initialization

pub mod middleware;
pub mod telemetry;

// Re-export commonly used types
pub use middleware::{
    get_request_id, request_id_middleware, security_headers_middleware, RequestId,
};
pub use telemetry::{init_telemetry, LogFormat};
