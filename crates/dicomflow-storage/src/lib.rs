//! dicomflow storage library
//!
//! Blob storage for received DICOM files and the chunks they arrive in.
//!
//! # Storage key format
//!
//! - **Medical files**: `dicom/{uploaded_by}/{order_id}/{file_id}/{file_name}`
//! - **Staged chunks**: `chunks/{uploaded_by}/{file_id}/{chunk_index:06}`
//!
//! Keys must not contain `..` or a leading `/`. Medical file keys are built in the
//! `keys` module; chunk keys come from `ChunkSession::chunk_key`.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::medical_file_key;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
