//! Chunked upload of a single file.
//!
//! Chunks go out strictly in order, one request at a time. The server stages each
//! one and reassembles the file when the last chunk arrives.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dicomflow_core::constants::CHUNK_SIZE;
use dicomflow_core::models::{
    sanitize_key_segment, ChunkReceipt, RegisterFolderStructureRequest,
    RegisterFolderStructureResponse,
};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use super::error::UploadError;
use super::walker::UploadCandidate;

/// One chunk request, with the metadata the server needs to route it
#[derive(Debug, Clone)]
pub struct OutgoingChunk {
    pub order_id: Uuid,
    pub file_id: String,
    pub file_name: String,
    pub folder_path: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub data: Bytes,
}

/// The network side of a folder upload
#[async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Register the folder paths of an upload; the server mints the order id
    async fn register_folder_structure(
        &self,
        request: RegisterFolderStructureRequest,
    ) -> anyhow::Result<RegisterFolderStructureResponse>;

    async fn send_chunk(&self, chunk: OutgoingChunk) -> anyhow::Result<ChunkReceipt>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u32,
    pub offset: u64,
    pub len: u64,
}

/// Split `size` bytes into `ceil(size / chunk_size)` ranges.
///
/// An empty file still gets one empty chunk, so a direct [`ChunkUploader`] caller
/// receives the server's rejection rather than a silent no-op. Files coming
/// through [`UploadOrchestrator`](super::UploadOrchestrator) never reach this case;
/// validation requires the 132-byte header first.
pub fn plan_chunks(size: u64, chunk_size: u64) -> Vec<ChunkRange> {
    let chunk_size = chunk_size.max(1);
    let total = size.div_ceil(chunk_size).max(1);
    (0..total)
        .map(|i| {
            let offset = i * chunk_size;
            ChunkRange {
                index: i as u32,
                offset,
                len: chunk_size.min(size - offset.min(size)),
            }
        })
        .collect()
}

/// `{unix_millis}-{relative path}`, reduced to characters safe for a storage key
pub fn file_identifier(relative_path: &str) -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_key_segment(relative_path)
    )
}

/// Progress of one file, reported after each acknowledged chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileProgress {
    pub file_index: usize,
    pub file_name: String,
    pub loaded: u64,
    pub total: u64,
    pub percent: u8,
}

pub(crate) fn percent_of(loaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (loaded.min(total) * 100 / total) as u8
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkUploadState {
    pub file_id: String,
    pub total_chunks: u32,
    pub chunks_sent: u32,
    pub bytes_sent: u64,
    pub bytes_total: u64,
}

impl ChunkUploadState {
    fn record(&mut self, len: u64) {
        self.chunks_sent = (self.chunks_sent + 1).min(self.total_chunks);
        self.bytes_sent += len;
    }

    pub fn is_complete(&self) -> bool {
        self.chunks_sent == self.total_chunks
    }
}

/// Sends one file through a [`ChunkTransport`]
pub struct ChunkUploader<'a, T: ChunkTransport + ?Sized> {
    transport: &'a T,
    chunk_size: u64,
}

impl<'a, T: ChunkTransport + ?Sized> ChunkUploader<'a, T> {
    pub fn new(transport: &'a T) -> Self {
        Self {
            transport,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Upload `candidate` into `order_id`. Any failed chunk fails the file.
    #[tracing::instrument(
        skip(self, candidate, on_progress),
        fields(file = %candidate.relative_path_string(), size_bytes = candidate.size_bytes)
    )]
    pub async fn upload(
        &self,
        order_id: Uuid,
        file_index: usize,
        candidate: &UploadCandidate,
        on_progress: &(dyn Fn(FileProgress) + Send + Sync),
    ) -> Result<ChunkUploadState, UploadError> {
        let relative = candidate.relative_path_string();
        let plan = plan_chunks(candidate.size_bytes, self.chunk_size);
        let mut state = ChunkUploadState {
            file_id: file_identifier(&relative),
            total_chunks: plan.len() as u32,
            chunks_sent: 0,
            bytes_sent: 0,
            bytes_total: candidate.size_bytes,
        };

        let io_error = |source| UploadError::Io {
            path: candidate.path.clone(),
            source,
        };
        let mut file = tokio::fs::File::open(&candidate.path)
            .await
            .map_err(io_error)?;

        for range in plan {
            let mut buffer = vec![0u8; range.len as usize];
            file.read_exact(&mut buffer).await.map_err(io_error)?;

            let chunk = OutgoingChunk {
                order_id,
                file_id: state.file_id.clone(),
                file_name: candidate.file_name().to_string(),
                folder_path: candidate.folder_path(),
                chunk_index: range.index,
                total_chunks: state.total_chunks,
                data: Bytes::from(buffer),
            };

            let receipt = self.transport.send_chunk(chunk).await.map_err(|e| {
                UploadError::Transport {
                    file: relative.clone(),
                    message: format!(
                        "chunk {}/{}: {:#}",
                        range.index + 1,
                        state.total_chunks,
                        e
                    ),
                }
            })?;

            state.record(range.len);
            on_progress(FileProgress {
                file_index,
                file_name: candidate.file_name().to_string(),
                loaded: state.bytes_sent,
                total: state.bytes_total,
                percent: percent_of(state.bytes_sent, state.bytes_total),
            });

            if state.is_complete() && !receipt.completed {
                return Err(UploadError::Transport {
                    file: relative,
                    message: "server acknowledged the last chunk without assembling the file"
                        .to_string(),
                });
            }
        }

        tracing::debug!(file_id = %state.file_id, chunks = state.total_chunks, "File uploaded");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[test]
    fn plan_covers_the_file_exactly() {
        for (size, chunk) in [(1u64, 5u64), (5, 5), (6, 5), (12, 5), (10_000_001, 5 * 1024 * 1024)] {
            let plan = plan_chunks(size, chunk);
            assert_eq!(plan.len() as u64, size.div_ceil(chunk));
            assert_eq!(plan.iter().map(|r| r.len).sum::<u64>(), size);
            assert!(plan.iter().all(|r| r.len <= chunk));
            for pair in plan.windows(2) {
                assert_eq!(pair[0].offset + pair[0].len, pair[1].offset);
            }
        }
    }

    #[test]
    fn empty_file_gets_one_empty_chunk() {
        assert_eq!(
            plan_chunks(0, CHUNK_SIZE),
            vec![ChunkRange {
                index: 0,
                offset: 0,
                len: 0
            }]
        );
    }

    #[tokio::test]
    async fn empty_file_is_sent_as_a_single_empty_chunk() {
        let dir = tempdir().unwrap();
        let file = candidate(dir.path(), b"");
        let transport = RecordingTransport::default();

        let state = ChunkUploader::new(&transport)
            .upload(Uuid::new_v4(), 0, &file, &|_| {})
            .await
            .unwrap();

        assert_eq!(state.total_chunks, 1);
        let chunks = transport.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].total_chunks, 1);
        assert!(chunks[0].data.is_empty());
    }

    #[tokio::test]
    async fn orchestrator_stops_empty_files_before_chunking() {
        let dir = tempdir().unwrap();
        let file = candidate(dir.path(), b"");
        let transport = std::sync::Arc::new(RecordingTransport::default());

        let outcome = crate::upload::UploadOrchestrator::new(transport.clone())
            .upload_folder(&[file], Uuid::new_v4())
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("2.dcm"));
        assert!(transport.chunks.lock().unwrap().is_empty());
    }

    #[test]
    fn identifier_is_key_safe() {
        let id = file_identifier("A/B/scan 1.dcm");
        let (millis, rest) = id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rest, "A_B_scan_1.dcm");
    }

    #[test]
    fn percent_handles_empty_files() {
        assert_eq!(percent_of(0, 0), 100);
        assert_eq!(percent_of(5, 10), 50);
        assert_eq!(percent_of(10, 10), 100);
    }

    #[derive(Default)]
    struct RecordingTransport {
        chunks: Mutex<Vec<OutgoingChunk>>,
        fail_at: Option<u32>,
    }

    #[async_trait]
    impl ChunkTransport for RecordingTransport {
        async fn register_folder_structure(
            &self,
            request: RegisterFolderStructureRequest,
        ) -> anyhow::Result<RegisterFolderStructureResponse> {
            Ok(RegisterFolderStructureResponse {
                order_id: Uuid::new_v4(),
                structure: request.structure,
            })
        }

        async fn send_chunk(&self, chunk: OutgoingChunk) -> anyhow::Result<ChunkReceipt> {
            if self.fail_at == Some(chunk.chunk_index) {
                anyhow::bail!("connection reset");
            }
            let receipt = ChunkReceipt {
                file_id: chunk.file_id.clone(),
                chunk_index: chunk.chunk_index as i32,
                received_chunks: chunk.chunk_index as i32 + 1,
                total_chunks: chunk.total_chunks as i32,
                completed: chunk.chunk_index + 1 == chunk.total_chunks,
                record_id: None,
            };
            self.chunks.lock().unwrap().push(chunk);
            Ok(receipt)
        }
    }

    fn candidate(dir: &std::path::Path, bytes: &[u8]) -> UploadCandidate {
        let path = dir.join("2.dcm");
        std::fs::write(&path, bytes).unwrap();
        UploadCandidate::new(
            path,
            vec!["A".to_string(), "B".to_string(), "2.dcm".to_string()],
            bytes.len() as u64,
        )
    }

    #[tokio::test]
    async fn sends_chunks_in_order_and_reports_progress() {
        let dir = tempdir().unwrap();
        let data: Vec<u8> = (0..23u8).collect();
        let file = candidate(dir.path(), &data);
        let transport = RecordingTransport::default();
        let progress = Mutex::new(Vec::new());
        let order_id = Uuid::new_v4();

        let state = ChunkUploader::new(&transport)
            .with_chunk_size(10)
            .upload(order_id, 4, &file, &|p| progress.lock().unwrap().push(p))
            .await
            .unwrap();

        assert!(state.is_complete());
        assert_eq!(state.bytes_sent, 23);

        let chunks = transport.chunks.lock().unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(chunks.iter().all(|c| c.order_id == order_id
            && c.file_id == state.file_id
            && c.folder_path == "A/B"
            && c.file_name == "2.dcm"));
        let joined: Vec<u8> = chunks.iter().flat_map(|c| c.data.to_vec()).collect();
        assert_eq!(joined, data);

        let progress = progress.lock().unwrap();
        assert_eq!(
            progress.iter().map(|p| p.loaded).collect::<Vec<_>>(),
            vec![10, 20, 23]
        );
        assert_eq!(progress.last().unwrap().percent, 100);
        assert!(progress.iter().all(|p| p.file_index == 4));
    }

    #[tokio::test]
    async fn failed_chunk_fails_the_file() {
        let dir = tempdir().unwrap();
        let file = candidate(dir.path(), &[7u8; 25]);
        let transport = RecordingTransport {
            fail_at: Some(1),
            ..Default::default()
        };

        let err = ChunkUploader::new(&transport)
            .with_chunk_size(10)
            .upload(Uuid::new_v4(), 0, &file, &|_| {})
            .await
            .unwrap_err();

        match err {
            UploadError::Transport { file, message } => {
                assert_eq!(file, "A/B/2.dcm");
                assert!(message.contains("chunk 2/3"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
        assert_eq!(transport.chunks.lock().unwrap().len(), 1);
    }
}
