//! Async wrapper around the DICOM validator: reads the header bytes from disk.

use dicomflow_core::constants::DICOM_HEADER_LEN;
use dicomflow_core::validation::{validate_dicom, HeaderProbe, UploadLimit, ValidationResult};
use futures::future::join_all;
use std::path::Path;
use tokio::io::AsyncReadExt;

use super::error::UploadError;
use super::walker::UploadCandidate;

/// Up to the first 132 bytes of the file at `path`.
pub async fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut header = Vec::with_capacity(DICOM_HEADER_LEN);
    file.take(DICOM_HEADER_LEN as u64)
        .read_to_end(&mut header)
        .await?;
    Ok(header)
}

/// Validate one file on disk under `limit`. An unreadable header skips the
/// magic-byte rule.
pub async fn inspect_file(candidate: &UploadCandidate, limit: UploadLimit) -> ValidationResult {
    match read_header(&candidate.path).await {
        Ok(header) => validate_dicom(
            candidate.file_name(),
            candidate.size_bytes,
            HeaderProbe::Bytes(&header),
            limit,
        ),
        Err(e) => {
            tracing::debug!(
                path = %candidate.path.display(),
                error = %e,
                "Could not read DICOM header, leaving the check to the server"
            );
            validate_dicom(
                candidate.file_name(),
                candidate.size_bytes,
                HeaderProbe::Unreadable,
                limit,
            )
        }
    }
}

/// Validate every candidate concurrently; all failures are reported together.
pub async fn validate_all(files: &[UploadCandidate], limit: UploadLimit) -> Result<(), UploadError> {
    let results = join_all(files.iter().map(|f| inspect_file(f, limit))).await;

    let reasons: Vec<String> = results
        .into_iter()
        .filter_map(|result| result.reason)
        .collect();

    if reasons.is_empty() {
        Ok(())
    } else {
        tracing::warn!(failed = reasons.len(), total = files.len(), "Files failed validation");
        Err(UploadError::Validation(reasons))
    }
}
