//! DICOM file validation.
//!
//! Three rules, checked in order, first failure wins:
//! 1. size within the cap of the upload path,
//! 2. `.dcm` / `.dicom` extension or no extension at all,
//! 3. `DICM` at offset 128, or four zero bytes there.
//!
//! A header that could not be read passes rule 3: the server makes the final call.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::constants::{
    DICOM_EXTENSIONS, DICOM_HEADER_LEN, DICOM_MAGIC, DICOM_MAGIC_OFFSET, FOLDER_UPLOAD_MAX_BYTES,
    SINGLE_UPLOAD_MAX_BYTES,
};

/// Size cap that applies to a file, depending on the upload path it takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadLimit {
    /// Chunked folder upload (2 GiB per file)
    FolderUpload,
    /// Single-request upload (100 MiB per file)
    SingleFile,
    /// Explicit cap in bytes
    Custom(u64),
}

impl UploadLimit {
    pub fn max_bytes(&self) -> u64 {
        match self {
            UploadLimit::FolderUpload => FOLDER_UPLOAD_MAX_BYTES,
            UploadLimit::SingleFile => SINGLE_UPLOAD_MAX_BYTES,
            UploadLimit::Custom(max) => *max,
        }
    }

    pub fn label(&self) -> String {
        let max = self.max_bytes();
        const GIB: u64 = 1024 * 1024 * 1024;
        const MIB: u64 = 1024 * 1024;
        if max >= GIB && max % GIB == 0 {
            format!("{} GB", max / GIB)
        } else if max >= MIB && max % MIB == 0 {
            format!("{} MB", max / MIB)
        } else {
            format!("{} bytes", max)
        }
    }
}

/// What is known about the first bytes of a file
#[derive(Debug, Clone, Copy)]
pub enum HeaderProbe<'a> {
    /// Up to the first 132 bytes of the file
    Bytes(&'a [u8]),
    /// Reading failed; the magic-byte rule is skipped
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DicomValidationError {
    #[error("File {name} exceeds the maximum size of {limit} ({size} bytes)")]
    FileTooLarge {
        name: String,
        size: u64,
        limit: String,
    },

    #[error("File {name} has an unsupported extension '.{extension}' (expected .dcm, .dicom or none)")]
    InvalidExtension { name: String, extension: String },

    #[error("File {name} is too short to be a DICOM file ({len} bytes)")]
    TruncatedHeader { name: String, len: usize },

    #[error("File {name} is not a valid DICOM file (missing DICM marker)")]
    MissingMagic { name: String },
}

/// Outcome of validating one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

impl From<Result<(), DicomValidationError>> for ValidationResult {
    fn from(result: Result<(), DicomValidationError>) -> Self {
        match result {
            Ok(()) => ValidationResult::ok(),
            Err(err) => ValidationResult::invalid(err.to_string()),
        }
    }
}

pub fn check_size(name: &str, size: u64, limit: UploadLimit) -> Result<(), DicomValidationError> {
    if size > limit.max_bytes() {
        return Err(DicomValidationError::FileTooLarge {
            name: name.to_string(),
            size,
            limit: limit.label(),
        });
    }
    Ok(())
}

/// Extension after the last dot of the final path segment, if any.
/// Dot-files and names ending in a dot count as extension-less.
fn extension_of(name: &str) -> Option<String> {
    let file_name = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_lowercase()),
        _ => None,
    }
}

pub fn check_extension(name: &str) -> Result<(), DicomValidationError> {
    match extension_of(name) {
        None => Ok(()),
        Some(ext) if DICOM_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(DicomValidationError::InvalidExtension {
            name: name.to_string(),
            extension: ext,
        }),
    }
}

pub fn check_magic(name: &str, header: HeaderProbe<'_>) -> Result<(), DicomValidationError> {
    let bytes = match header {
        HeaderProbe::Unreadable => return Ok(()),
        HeaderProbe::Bytes(bytes) => bytes,
    };

    if bytes.len() < DICOM_HEADER_LEN {
        return Err(DicomValidationError::TruncatedHeader {
            name: name.to_string(),
            len: bytes.len(),
        });
    }

    let marker = &bytes[DICOM_MAGIC_OFFSET..DICOM_MAGIC_OFFSET + 4];
    if marker == DICOM_MAGIC || marker.iter().all(|b| *b == 0) {
        Ok(())
    } else {
        Err(DicomValidationError::MissingMagic {
            name: name.to_string(),
        })
    }
}

/// Validate one file; the first failing rule is reported.
pub fn validate_dicom(
    name: &str,
    size: u64,
    header: HeaderProbe<'_>,
    limit: UploadLimit,
) -> ValidationResult {
    check_size(name, size, limit)
        .and_then(|_| check_extension(name))
        .and_then(|_| check_magic(name, header))
        .into()
}

/// Every failing rule, in rule order.
pub fn collect_reasons(
    name: &str,
    size: u64,
    header: HeaderProbe<'_>,
    limit: UploadLimit,
) -> Vec<DicomValidationError> {
    [
        check_size(name, size, limit),
        check_extension(name),
        check_magic(name, header),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}
