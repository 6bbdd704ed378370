//! Validation modules

pub mod dicom;
pub mod folder_path;

pub use dicom::{
    collect_reasons, validate_dicom, DicomValidationError, HeaderProbe, UploadLimit,
    ValidationResult,
};
pub use folder_path::{folder_path_of, normalize_folder_path, MAX_FOLDER_PATH_LENGTH};
