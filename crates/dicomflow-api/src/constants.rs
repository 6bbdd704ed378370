//! Route constants

/// Prefix of every upload and order route
pub const DICOM_PREFIX: &str = "/dicom";

/// Multipart field carrying the bytes of one chunk
pub const CHUNK_FIELD: &str = "chunk";

/// Multipart field carrying whole files on `/dicom/upload`
pub const FILES_FIELD: &str = "files";

/// Browser form encoding of the same field
pub const FILES_FIELD_ARRAY: &str = "files[]";
