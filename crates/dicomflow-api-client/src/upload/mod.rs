//! Client side of the folder upload pipeline: walk, validate, chunk, orchestrate.

pub mod chunk;
pub mod error;
pub mod inspect;
pub mod orchestrator;
pub mod walker;

pub use chunk::{
    file_identifier, plan_chunks, ChunkRange, ChunkTransport, ChunkUploadState, ChunkUploader,
    FileProgress, OutgoingChunk,
};
pub use error::UploadError;
pub use inspect::{inspect_file, validate_all};
pub use orchestrator::{
    folder_structure, OverallProgress, ProgressSink, RetryPolicy, RetryScope, UploadOrchestrator,
    UploadOutcome,
};
pub use walker::{walk, SkippedEntry, UploadCandidate, WalkReport};
pub use tokio_util::sync::CancellationToken;
