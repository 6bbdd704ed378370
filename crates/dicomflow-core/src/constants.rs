//! Application-wide constants.

/// Size of one chunk sent to `POST /dicom/chunks` (5 MiB).
pub const CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Per-file cap when a whole folder is uploaded through the chunked path (2 GiB).
pub const FOLDER_UPLOAD_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Per-file cap for the single-request `/dicom/upload` path (100 MiB).
pub const SINGLE_UPLOAD_MAX_BYTES: u64 = 100 * 1024 * 1024;

/// Number of bytes read from the start of a file to sniff the DICOM preamble.
pub const DICOM_HEADER_LEN: usize = 132;

/// Offset of the `DICM` magic inside the DICOM header (after the 128-byte preamble).
pub const DICOM_MAGIC_OFFSET: usize = 128;

pub const DICOM_MAGIC: &[u8; 4] = b"DICM";

/// Extensions accepted in addition to extension-less files.
pub const DICOM_EXTENSIONS: &[&str] = &["dcm", "dicom"];

/// Tag attached to every record created by the whole-file upload path.
pub const DICOM_TAG: &str = "DICOM";

/// Uploads sent concurrently by the client orchestrator.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 3;

/// A chunk session with no new chunk for this long is abandoned (24 h).
pub const CHUNK_SESSION_IDLE_SECS: i64 = 24 * 60 * 60;

/// How often the server sweeps abandoned chunk sessions (1 h).
pub const CHUNK_SWEEP_INTERVAL_SECS: u64 = 60 * 60;
