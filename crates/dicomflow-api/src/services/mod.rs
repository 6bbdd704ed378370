//! Business logic behind the `/dicom/*` handlers
//!
//! Free functions over repository traits and the storage backend; the handlers only
//! parse requests and render responses.

pub mod orders;
pub mod sweep;
pub mod upload;
