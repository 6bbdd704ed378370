//! Test fixtures: DICOM-looking byte blobs and seeded records.

use chrono::{Duration, Utc};
use dicomflow_core::models::{FileType, MedicalFile, OrderStatus};
use uuid::Uuid;

/// `len` bytes with the `DICM` marker at offset 128; the body is a repeating pattern
/// so reassembly mistakes show up in comparisons.
pub fn dicom_bytes(len: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    if len >= 132 {
        bytes[..128].fill(0);
        bytes[128..132].copy_from_slice(b"DICM");
    }
    bytes
}

/// A stored record, as if a previous upload had created it
pub fn record(
    uploaded_by: Uuid,
    order_id: Uuid,
    patient_id: Uuid,
    file_name: &str,
    age_minutes: i64,
) -> MedicalFile {
    let created = Utc::now() - Duration::minutes(age_minutes);
    MedicalFile {
        id: Uuid::new_v4(),
        file_name: file_name.to_string(),
        file_type: FileType::Dicom,
        storage_path: format!("dicom/{}/{}/{}/{}", uploaded_by, order_id, Uuid::new_v4(), file_name),
        uploaded_by,
        patient_id,
        size_bytes: 132,
        status: OrderStatus::InProgress,
        progress: 0,
        order_id,
        collaborating_doctors: Vec::new(),
        folder_path: String::new(),
        tags: vec!["DICOM".to_string()],
        created_at: created,
        updated_at: created,
    }
}
