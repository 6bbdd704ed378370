//! Orders: the virtual grouping of medical files that share an `order_id` and an
//! uploader, plus the DTOs of the order endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::{MedicalFile, OrderStatus};

/// Bucket selected by `GET /dicom/orders?status=...`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderBucket {
    /// Orders still being worked on (`PENDING`, `IN_PROGRESS`)
    #[default]
    Current,
    /// Orders that reached a terminal state (`COMPLETED`, `CANCELLED`)
    Completed,
}

impl OrderBucket {
    pub fn statuses(&self) -> &'static [OrderStatus] {
        match self {
            OrderBucket::Current => &[OrderStatus::Pending, OrderStatus::InProgress],
            OrderBucket::Completed => &[OrderStatus::Completed, OrderStatus::Cancelled],
        }
    }

    pub fn contains(&self, status: OrderStatus) -> bool {
        self.statuses().contains(&status)
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    #[serde(default)]
    pub status: OrderBucket,
}

/// The records of one order, as seen by one uploader.
#[derive(Debug, Clone)]
pub struct OrderGroup {
    pub order_id: Uuid,
    pub uploaded_by: Uuid,
    pub records: Vec<MedicalFile>,
}

impl OrderGroup {
    /// Group records by order id, preserving the first-seen order of groups.
    ///
    /// Records from different uploaders never share a group, even when their
    /// order ids collide.
    pub fn group(records: Vec<MedicalFile>) -> Vec<OrderGroup> {
        let mut index: HashMap<(Uuid, Uuid), usize> = HashMap::new();
        let mut groups: Vec<OrderGroup> = Vec::new();

        for record in records {
            let key = (record.order_id, record.uploaded_by);
            match index.get(&key) {
                Some(&i) => groups[i].records.push(record),
                None => {
                    index.insert(key, groups.len());
                    groups.push(OrderGroup {
                        order_id: record.order_id,
                        uploaded_by: record.uploaded_by,
                        records: vec![record],
                    });
                }
            }
        }

        groups
    }

    pub fn patient_id(&self) -> Option<Uuid> {
        self.records.first().map(|r| r.patient_id)
    }

    /// Least advanced member status, so an order only reads as terminal once
    /// every file is.
    pub fn status(&self) -> OrderStatus {
        self.records
            .iter()
            .map(|r| r.status)
            .min_by_key(|s| s.rank())
            .unwrap_or(OrderStatus::Pending)
    }

    /// Mean of the member progress values, rounded down.
    pub fn progress(&self) -> i32 {
        if self.records.is_empty() {
            return 0;
        }
        let total: i64 = self.records.iter().map(|r| i64::from(r.progress)).sum();
        (total / self.records.len() as i64) as i32
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.created_at).min()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.records.iter().map(|r| r.updated_at).max()
    }

    /// Union of collaborating doctors across members, in first-seen order.
    pub fn collaborators(&self) -> Vec<Uuid> {
        let mut seen = Vec::new();
        for id in self.records.iter().flat_map(|r| r.collaborating_doctors.iter()) {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }

    pub fn file_count(&self) -> usize {
        self.records.len()
    }
}

/// A doctor referenced by an order, with the display name from the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_id: Uuid,
    pub patient_id: Uuid,
    pub status: OrderStatus,
    pub progress: i32,
    /// Display names of the collaborating doctors
    pub collaborating_doctors: Vec<String>,
    pub file_count: usize,
    pub creation_date: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderFileEntry {
    pub id: Uuid,
    pub file_name: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTime<Utc>,
    pub folder_path: String,
}

impl From<&MedicalFile> for OrderFileEntry {
    fn from(file: &MedicalFile) -> Self {
        OrderFileEntry {
            id: file.id,
            file_name: file.file_name.clone(),
            size_bytes: file.size_bytes,
            uploaded_at: file.created_at,
            folder_path: file.folder_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub order_id: Uuid,
    pub patient_id: Uuid,
    pub status: OrderStatus,
    pub progress: i32,
    pub collaborating_doctors: Vec<DoctorRef>,
    pub files: Vec<OrderFileEntry>,
}

/// Body of `PATCH /dicom/orders/{orderId}/status`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub progress: i32,
    /// Number of records updated
    pub updated: u64,
}

/// Body of `POST /dicom/orders/{orderId}/collaborators`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddCollaboratorRequest {
    pub doctor_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorsResponse {
    pub order_id: Uuid,
    pub collaborating_doctors: Vec<DoctorRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileType;
    use chrono::Duration;

    fn record(order_id: Uuid, uploaded_by: Uuid, status: OrderStatus, progress: i32) -> MedicalFile {
        let now = Utc::now();
        MedicalFile {
            id: Uuid::new_v4(),
            file_name: "slice.dcm".to_string(),
            file_type: FileType::Dicom,
            storage_path: format!("dicom/{}/{}", uploaded_by, Uuid::new_v4()),
            uploaded_by,
            patient_id: Uuid::nil(),
            size_bytes: 10,
            status,
            progress,
            order_id,
            collaborating_doctors: Vec::new(),
            folder_path: String::new(),
            tags: vec!["DICOM".to_string()],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn group_separates_uploaders_with_colliding_order_ids() {
        let order = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let groups = OrderGroup::group(vec![
            record(order, alice, OrderStatus::InProgress, 0),
            record(order, bob, OrderStatus::InProgress, 0),
            record(order, alice, OrderStatus::InProgress, 0),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].uploaded_by, alice);
        assert_eq!(groups[0].file_count(), 2);
        assert_eq!(groups[1].uploaded_by, bob);
    }

    #[test]
    fn status_is_least_advanced_member() {
        let order = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let mut group = OrderGroup {
            order_id: order,
            uploaded_by: owner,
            records: vec![
                record(order, owner, OrderStatus::Completed, 100),
                record(order, owner, OrderStatus::InProgress, 50),
            ],
        };
        assert_eq!(group.status(), OrderStatus::InProgress);
        assert!(!OrderBucket::Completed.contains(group.status()));

        group.records[1].status = OrderStatus::Cancelled;
        assert_eq!(group.status(), OrderStatus::Cancelled);
        assert!(OrderBucket::Completed.contains(group.status()));
    }

    #[test]
    fn progress_and_dates_aggregate() {
        let order = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let mut first = record(order, owner, OrderStatus::InProgress, 40);
        let mut second = record(order, owner, OrderStatus::InProgress, 61);
        first.created_at -= Duration::hours(1);
        second.updated_at += Duration::hours(1);
        let expected_created = first.created_at;
        let expected_updated = second.updated_at;

        let group = OrderGroup {
            order_id: order,
            uploaded_by: owner,
            records: vec![first, second],
        };
        assert_eq!(group.progress(), 50);
        assert_eq!(group.creation_date(), Some(expected_created));
        assert_eq!(group.last_update(), Some(expected_updated));
    }

    #[test]
    fn collaborators_are_unioned_once() {
        let order = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let doctor = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut a = record(order, owner, OrderStatus::InProgress, 0);
        let mut b = record(order, owner, OrderStatus::InProgress, 0);
        a.collaborating_doctors = vec![doctor];
        b.collaborating_doctors = vec![doctor, other];
        let group = OrderGroup {
            order_id: order,
            uploaded_by: owner,
            records: vec![a, b],
        };
        assert_eq!(group.collaborators(), vec![doctor, other]);
    }

    #[test]
    fn bucket_defaults_to_current() {
        let query: ListOrdersQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.status, OrderBucket::Current);
        let query: ListOrdersQuery = serde_json::from_str(r#"{"status":"completed"}"#).unwrap();
        assert_eq!(query.status, OrderBucket::Completed);
    }

    #[test]
    fn update_request_rejects_out_of_range_progress() {
        let request = UpdateOrderStatusRequest {
            status: OrderStatus::Completed,
            progress: 101,
        };
        assert!(request.validate().is_err());

        let request = UpdateOrderStatusRequest {
            status: OrderStatus::Completed,
            progress: 100,
        };
        assert!(request.validate().is_ok());
    }
}
