//! Folder upload orchestration.
//!
//! Validate everything, register the folder structure (which mints the order id),
//! then push files through the chunk uploader in consecutive groups: every file of a
//! group runs concurrently and the next group starts only once the whole group is
//! done.

use dicomflow_core::constants::{CHUNK_SIZE, DEFAULT_UPLOAD_CONCURRENCY};
use dicomflow_core::models::RegisterFolderStructureRequest;
use dicomflow_core::validation::UploadLimit;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::chunk::{percent_of, ChunkTransport, ChunkUploader, FileProgress};
use super::error::UploadError;
use super::inspect::validate_all;
use super::walker::UploadCandidate;

/// What gets retried when a file fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryScope {
    /// Retry only the failing file, with exponential backoff
    #[default]
    PerFile,
    /// Start the whole upload over (validation, a new registration, every file)
    /// after a fixed delay
    WholeUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub scope: RetryScope,
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            scope: RetryScope::PerFile,
            max_retries: 1,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn whole_upload() -> Self {
        Self {
            scope: RetryScope::WholeUpload,
            ..Self::default()
        }
    }

    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.scope {
            RetryScope::WholeUpload => self.initial_delay,
            RetryScope::PerFile => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.initial_delay.saturating_mul(factor)
            }
        }
    }
}

/// Progress of the whole upload, computed from every file's latest byte count
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverallProgress {
    pub loaded: u64,
    pub total: u64,
    pub percent: u8,
    pub files_completed: usize,
    pub files_total: usize,
}

pub type ProgressSink = Arc<dyn Fn(OverallProgress) + Send + Sync>;

/// Terminal result of [`UploadOrchestrator::upload_folder`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Order id of the last registration, also on failure: partially uploaded
    /// orders are not rolled back
    pub order_id: Option<Uuid>,
    /// Files fully uploaded in the last attempt
    pub uploaded: usize,
}

/// Distinct folder paths of `files`, each with the names of the files it holds
pub fn folder_structure(files: &[UploadCandidate]) -> BTreeMap<String, Vec<String>> {
    let mut structure: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for file in files {
        structure
            .entry(file.folder_path())
            .or_default()
            .push(file.file_name().to_string());
    }
    structure
}

#[derive(Debug, Clone, Copy, Default)]
struct FileSlot {
    loaded: u64,
    done: bool,
}

struct ProgressTracker {
    slots: Mutex<Vec<FileSlot>>,
    total: u64,
    sink: Option<ProgressSink>,
}

impl ProgressTracker {
    fn new(files: &[UploadCandidate], sink: Option<ProgressSink>) -> Self {
        Self {
            slots: Mutex::new(vec![FileSlot::default(); files.len()]),
            total: files.iter().map(|f| f.size_bytes).sum(),
            sink,
        }
    }

    fn with_slots(&self, f: impl FnOnce(&mut Vec<FileSlot>)) {
        let snapshot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut slots);
            let loaded = slots.iter().map(|s| s.loaded).sum();
            OverallProgress {
                loaded,
                total: self.total,
                percent: percent_of(loaded, self.total),
                files_completed: slots.iter().filter(|s| s.done).count(),
                files_total: slots.len(),
            }
        };
        if let Some(sink) = &self.sink {
            sink(snapshot);
        }
    }

    fn file_loaded(&self, index: usize, loaded: u64) {
        self.with_slots(|slots| {
            if let Some(slot) = slots.get_mut(index) {
                slot.loaded = loaded;
            }
        });
    }

    fn file_done(&self, index: usize) {
        self.with_slots(|slots| {
            if let Some(slot) = slots.get_mut(index) {
                slot.done = true;
            }
        });
    }

    fn reset(&self) {
        self.with_slots(|slots| slots.iter_mut().for_each(|s| *s = FileSlot::default()));
    }
}

#[derive(Debug, Default)]
struct Attempt {
    order_id: Option<Uuid>,
    uploaded: usize,
}

/// Drives a folder upload through a [`ChunkTransport`]
pub struct UploadOrchestrator<T: ChunkTransport + ?Sized> {
    transport: Arc<T>,
    concurrency: usize,
    retry: RetryPolicy,
    chunk_size: u64,
    limit: UploadLimit,
    cancel: CancellationToken,
    progress: Option<ProgressSink>,
}

impl<T: ChunkTransport + ?Sized> UploadOrchestrator<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            retry: RetryPolicy::default(),
            chunk_size: CHUNK_SIZE,
            limit: UploadLimit::FolderUpload,
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    /// Upload `files` as one order for `patient_id`.
    #[tracing::instrument(skip(self, files), fields(files = files.len(), scope = ?self.retry.scope))]
    pub async fn upload_folder(&self, files: &[UploadCandidate], patient_id: Uuid) -> UploadOutcome {
        if files.is_empty() {
            return UploadOutcome {
                error: Some("No files to upload".to_string()),
                ..UploadOutcome::default()
            };
        }

        let tracker = ProgressTracker::new(files, self.progress.clone());
        let attempts = match self.retry.scope {
            RetryScope::WholeUpload => self.retry.max_retries + 1,
            RetryScope::PerFile => 1,
        };

        let mut attempt = Attempt::default();
        let mut number = 0;
        let result = loop {
            number += 1;
            match self.run(files, patient_id, &tracker, &mut attempt).await {
                Ok(()) => break Ok(()),
                Err(err) if number < attempts && err.is_retryable() => {
                    let delay = self.retry.delay_for(number);
                    tracing::warn!(
                        error = %err,
                        attempt = number,
                        delay_ms = delay.as_millis() as u64,
                        "Upload failed, starting over"
                    );
                    tracker.reset();
                    if let Err(cancelled) = self.pause(delay).await {
                        break Err(cancelled);
                    }
                }
                Err(err) => break Err(err),
            }
        };

        match result {
            Ok(()) => {
                tracing::info!(
                    order_id = ?attempt.order_id,
                    uploaded = attempt.uploaded,
                    "Folder upload completed"
                );
                UploadOutcome {
                    success: true,
                    error: None,
                    order_id: attempt.order_id,
                    uploaded: attempt.uploaded,
                }
            }
            Err(err) => {
                tracing::error!(error = %err, order_id = ?attempt.order_id, "Folder upload failed");
                tracker.reset();
                UploadOutcome {
                    success: false,
                    error: Some(err.to_string()),
                    order_id: attempt.order_id,
                    uploaded: attempt.uploaded,
                }
            }
        }
    }

    async fn run(
        &self,
        files: &[UploadCandidate],
        patient_id: Uuid,
        tracker: &ProgressTracker,
        attempt: &mut Attempt,
    ) -> Result<(), UploadError> {
        *attempt = Attempt::default();
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        validate_all(files, self.limit).await?;

        let structure = folder_structure(files);
        let response = self
            .transport
            .register_folder_structure(RegisterFolderStructureRequest {
                patient_id,
                structure: structure.keys().cloned().collect(),
            })
            .await
            .map_err(|e| UploadError::Registration(format!("{:#}", e)))?;
        let order_id = response.order_id;
        attempt.order_id = Some(order_id);
        tracing::info!(%order_id, folders = structure.len(), "Folder structure registered");

        let indexed: Vec<(usize, &UploadCandidate)> = files.iter().enumerate().collect();
        for group in indexed.chunks(self.concurrency) {
            if self.cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }

            let results = join_all(
                group
                    .iter()
                    .map(|(index, file)| self.upload_file(order_id, *index, file, tracker)),
            )
            .await;

            let mut first_error = None;
            for result in results {
                match result {
                    Ok(()) => attempt.uploaded += 1,
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }
        }

        Ok(())
    }

    async fn upload_file(
        &self,
        order_id: Uuid,
        index: usize,
        file: &UploadCandidate,
        tracker: &ProgressTracker,
    ) -> Result<(), UploadError> {
        let retries = match self.retry.scope {
            RetryScope::PerFile => self.retry.max_retries,
            RetryScope::WholeUpload => 0,
        };
        let uploader = ChunkUploader::new(self.transport.as_ref()).with_chunk_size(self.chunk_size);
        let on_progress = |p: FileProgress| tracker.file_loaded(p.file_index, p.loaded);

        let mut retry = 0;
        loop {
            match uploader.upload(order_id, index, file, &on_progress).await {
                Ok(_) => {
                    tracker.file_done(index);
                    return Ok(());
                }
                Err(err) if retry < retries && err.is_retryable() => {
                    retry += 1;
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        file = %file.relative_path_string(),
                        error = %err,
                        retry,
                        delay_ms = delay.as_millis() as u64,
                        "File upload failed, retrying"
                    );
                    tracker.file_loaded(index, 0);
                    self.pause(delay).await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn pause(&self, delay: Duration) -> Result<(), UploadError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::chunk::OutgoingChunk;
    use crate::upload::walker::walk;
    use async_trait::async_trait;
    use dicomflow_core::models::{ChunkReceipt, RegisterFolderStructureResponse};
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct InstrumentedTransport {
        registrations: Mutex<Vec<RegisterFolderStructureRequest>>,
        chunks: Mutex<Vec<OutgoingChunk>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        /// Remaining failures per file name
        failures: Mutex<HashMap<String, u32>>,
        latency: Duration,
        cancel_on_register: Option<CancellationToken>,
    }

    impl InstrumentedTransport {
        fn failing(file_name: &str, times: u32) -> Self {
            let transport = Self::default();
            transport
                .failures
                .lock()
                .unwrap()
                .insert(file_name.to_string(), times);
            transport
        }

        fn registrations(&self) -> usize {
            self.registrations.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChunkTransport for InstrumentedTransport {
        async fn register_folder_structure(
            &self,
            request: RegisterFolderStructureRequest,
        ) -> anyhow::Result<RegisterFolderStructureResponse> {
            if let Some(token) = &self.cancel_on_register {
                token.cancel();
            }
            let structure = request.structure.clone();
            self.registrations.lock().unwrap().push(request);
            Ok(RegisterFolderStructureResponse {
                order_id: Uuid::new_v4(),
                structure,
            })
        }

        async fn send_chunk(&self, chunk: OutgoingChunk) -> anyhow::Result<ChunkReceipt> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(remaining) = failures.get_mut(&chunk.file_name) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        anyhow::bail!("503 Service Unavailable");
                    }
                }
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

    fn dicom_bytes(len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; len];
        bytes[128..132].copy_from_slice(b"DICM");
        bytes
    }

    /// Files under `<tmp>/Study`, given as paths relative to it
    async fn study(files: &[(&str, Vec<u8>)]) -> (TempDir, Vec<UploadCandidate>) {
        let dir = tempfile::tempdir().unwrap();
        let root: PathBuf = dir.path().join("Study");
        for (relative, bytes) in files {
            let path = root.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, bytes).unwrap();
        }
        let mut candidates = walk(&[root]).await.candidates;
        candidates.sort_by_key(|c| c.relative_path_string());
        (dir, candidates)
    }

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<OverallProgress>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = events.clone();
        let sink: ProgressSink = Arc::new(move |p| captured.lock().unwrap().push(p));
        (sink, events)
    }

    #[test]
    fn per_file_backoff_doubles() {
        let policy = RetryPolicy {
            max_retries: 3,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(RetryPolicy::whole_upload().delay_for(3), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn structure_groups_files_by_folder() {
        let (_dir, files) = study(&[
            ("A/1.dcm", dicom_bytes(200)),
            ("A/B/2.dcm", dicom_bytes(200)),
            ("3", dicom_bytes(200)),
        ])
        .await;

        let structure = folder_structure(&files);
        assert_eq!(
            structure.keys().cloned().collect::<Vec<_>>(),
            vec!["Study", "Study/A", "Study/A/B"]
        );
        assert_eq!(structure["Study/A/B"], vec!["2.dcm".to_string()]);
    }

    #[tokio::test]
    async fn never_more_than_three_uploads_in_flight() {
        let files: Vec<(String, Vec<u8>)> = (0..8)
            .map(|i| (format!("S{}/{}.dcm", i % 3, i), dicom_bytes(300)))
            .collect();
        let borrowed: Vec<(&str, Vec<u8>)> =
            files.iter().map(|(p, b)| (p.as_str(), b.clone())).collect();
        let (_dir, candidates) = study(&borrowed).await;

        let transport = Arc::new(InstrumentedTransport {
            latency: Duration::from_millis(100),
            ..Default::default()
        });
        let outcome = UploadOrchestrator::new(transport.clone())
            .with_chunk_size(128)
            .upload_folder(&candidates, Uuid::new_v4())
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.uploaded, 8);
        assert_eq!(transport.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(transport.registrations(), 1);

        // 300 bytes in 128-byte chunks
        assert_eq!(transport.chunks.lock().unwrap().len(), 8 * 3);
    }

    #[tokio::test]
    async fn invalid_files_abort_before_any_request() {
        let (_dir, files) = study(&[
            ("A/1.dcm", dicom_bytes(200)),
            ("A/notes.txt", dicom_bytes(200)),
            ("A/bad.dcm", vec![9u8; 200]),
        ])
        .await;

        let transport = Arc::new(InstrumentedTransport::default());
        let outcome = UploadOrchestrator::new(transport.clone())
            .upload_folder(&files, Uuid::new_v4())
            .await;

        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.starts_with("2 file(s) failed validation"));
        assert!(error.contains("notes.txt"));
        assert!(error.contains("bad.dcm"));
        assert_eq!(transport.registrations(), 0);
        assert!(transport.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn progress_reaches_every_byte() {
        let (_dir, files) = study(&[("A/1.dcm", dicom_bytes(300)), ("2.dcm", dicom_bytes(500))]).await;
        let (sink, events) = recording_sink();

        let outcome = UploadOrchestrator::new(Arc::new(InstrumentedTransport::default()))
            .with_chunk_size(200)
            .with_progress(sink)
            .upload_folder(&files, Uuid::new_v4())
            .await;

        assert!(outcome.success);
        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.loaded, 800);
        assert_eq!(last.total, 800);
        assert_eq!(last.percent, 100);
        assert_eq!(last.files_completed, 2);
        assert_eq!(last.files_total, 2);
        assert!(events.windows(2).all(|w| w[0].loaded <= w[1].loaded));
    }

    #[tokio::test(start_paused = true)]
    async fn per_file_retry_resends_only_the_failing_file() {
        let (_dir, files) = study(&[
            ("A/1.dcm", dicom_bytes(200)),
            ("A/B/2.dcm", dicom_bytes(200)),
            ("3", dicom_bytes(200)),
        ])
        .await;
        let transport = Arc::new(InstrumentedTransport::failing("2.dcm", 1));
        let started = tokio::time::Instant::now();

        let outcome = UploadOrchestrator::new(transport.clone())
            .upload_folder(&files, Uuid::new_v4())
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.uploaded, 3);
        assert_eq!(transport.registrations(), 1);
        assert!(started.elapsed() >= Duration::from_secs(2));

        let chunks = transport.chunks.lock().unwrap();
        assert_eq!(chunks.iter().filter(|c| c.file_name == "1.dcm").count(), 1);
        assert_eq!(chunks.iter().filter(|c| c.file_name == "2.dcm").count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn whole_upload_retry_starts_over() {
        let (_dir, files) = study(&[("A/1.dcm", dicom_bytes(200)), ("A/2.dcm", dicom_bytes(200))]).await;
        let transport = Arc::new(InstrumentedTransport::failing("2.dcm", 1));
        let started = tokio::time::Instant::now();

        let outcome = UploadOrchestrator::new(transport.clone())
            .with_retry(RetryPolicy::whole_upload())
            .upload_folder(&files, Uuid::new_v4())
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(transport.registrations(), 2);
        assert!(started.elapsed() >= Duration::from_secs(2));

        // 1.dcm went out in both attempts
        let chunks = transport.chunks.lock().unwrap();
        assert_eq!(chunks.iter().filter(|c| c.file_name == "1.dcm").count(), 2);
        assert_eq!(outcome.uploaded, 2);
        assert_eq!(
            outcome.order_id,
            chunks.last().map(|c| c.order_id),
            "outcome reports the order of the successful attempt"
        );
    }

    #[tokio::test]
    async fn exhausted_retries_fail_and_reset_progress() {
        let (_dir, files) = study(&[("A/1.dcm", dicom_bytes(200)), ("A/2.dcm", dicom_bytes(200))]).await;
        let transport = Arc::new(InstrumentedTransport::failing("2.dcm", 5));
        let (sink, events) = recording_sink();

        let outcome = UploadOrchestrator::new(transport.clone())
            .with_retry(RetryPolicy::none())
            .with_progress(sink)
            .upload_folder(&files, Uuid::new_v4())
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Study/A/2.dcm"));
        assert!(outcome.order_id.is_some());
        assert_eq!(outcome.uploaded, 1);

        let last = events.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.loaded, 0);
        assert_eq!(last.files_completed, 0);
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_group() {
        let (_dir, files) = study(&[("1.dcm", dicom_bytes(200)), ("2.dcm", dicom_bytes(200))]).await;
        let token = CancellationToken::new();
        let transport = Arc::new(InstrumentedTransport {
            cancel_on_register: Some(token.clone()),
            ..Default::default()
        });

        let outcome = UploadOrchestrator::new(transport.clone())
            .with_cancellation(token)
            .upload_folder(&files, Uuid::new_v4())
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Upload cancelled"));
        assert!(transport.chunks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let transport = Arc::new(InstrumentedTransport::default());
        let outcome = UploadOrchestrator::new(transport.clone())
            .upload_folder(&[], Uuid::new_v4())
            .await;

        assert!(!outcome.success);
        assert_eq!(transport.registrations(), 0);
    }
}
