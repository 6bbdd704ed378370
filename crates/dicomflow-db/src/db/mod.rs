//! Database repositories for the upload pipeline
//!
//! Each repository is a trait (so handlers can run against in-memory doubles) with a
//! PostgreSQL implementation. Every method that touches medical files is scoped by
//! the uploader.

pub mod chunk_session;
pub mod medical_file;
pub mod upload_batch;
pub mod user;

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

pub use chunk_session::{ChunkSessionRepository, PgChunkSessionRepository};
pub use medical_file::{MedicalFileRepository, PgMedicalFileRepository};
pub use upload_batch::{PgUploadBatchRepository, UploadBatchRepository};
pub use user::{PgUserRepository, UserRepository};
