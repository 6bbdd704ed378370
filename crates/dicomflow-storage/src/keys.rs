//! Key generation for stored medical files.

use dicomflow_core::models::sanitize_key_segment;
use uuid::Uuid;

/// Final storage key of a received file.
///
/// `file_id` is the client-supplied chunk file id for folder uploads, or the record
/// id for whole-file uploads; either way it keeps same-named files of one order apart.
pub fn medical_file_key(uploaded_by: Uuid, order_id: Uuid, file_id: &str, file_name: &str) -> String {
    format!(
        "dicom/{}/{}/{}/{}",
        uploaded_by,
        order_id,
        sanitize_key_segment(file_id),
        sanitize_key_segment(file_name)
    )
}
