use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::AppError;

/// Kind of medical file stored for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "medical_file_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Stl,
    Dicom,
}

impl FileType {
    /// `.stl` files are meshes; everything accepted by the upload routes is DICOM.
    pub fn from_file_name(name: &str) -> Self {
        if name.to_lowercase().ends_with(".stl") {
            FileType::Stl
        } else {
            FileType::Dicom
        }
    }
}

/// Status shared by every medical file record and by the order they form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "order_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// How far along the lifecycle a status is; used to aggregate mixed orders.
    pub fn rank(&self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::InProgress => 1,
            OrderStatus::Cancelled => 2,
            OrderStatus::Completed => 3,
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                AppError::InvalidInput(format!(
                    "Invalid status '{}'. Must be one of: PENDING, IN_PROGRESS, COMPLETED, CANCELLED",
                    s
                ))
            })
    }
}

/// One stored medical file. Records are never deleted by the upload subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct MedicalFile {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub storage_path: String,
    pub uploaded_by: Uuid,
    pub patient_id: Uuid,
    pub size_bytes: i64,
    pub status: OrderStatus,
    pub progress: i32,
    pub order_id: Uuid,
    pub collaborating_doctors: Vec<Uuid>,
    /// Parent directory of the file relative to the upload root, `/`-separated.
    /// Empty for files at the root of the drop.
    pub folder_path: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when persisting a new record; the rest are defaulted.
#[derive(Debug, Clone)]
pub struct NewMedicalFile {
    pub file_name: String,
    pub file_type: FileType,
    pub storage_path: String,
    pub uploaded_by: Uuid,
    pub patient_id: Uuid,
    pub size_bytes: i64,
    pub order_id: Uuid,
    pub folder_path: String,
    pub tags: Vec<String>,
}

impl NewMedicalFile {
    /// Status every freshly received file starts in.
    pub const INITIAL_STATUS: OrderStatus = OrderStatus::InProgress;
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MedicalFileResponse {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub size_bytes: i64,
    pub status: OrderStatus,
    pub progress: i32,
    pub order_id: Uuid,
    pub patient_id: Uuid,
    pub folder_path: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MedicalFile> for MedicalFileResponse {
    fn from(file: MedicalFile) -> Self {
        MedicalFileResponse {
            id: file.id,
            file_name: file.file_name,
            file_type: file.file_type,
            size_bytes: file.size_bytes,
            status: file.status,
            progress: file.progress,
            order_id: file.order_id,
            patient_id: file.patient_id,
            folder_path: file.folder_path,
            tags: file.tags,
            created_at: file.created_at,
        }
    }
}
