//! Order views and order-level mutations.
//!
//! An order is the set of medical file records sharing an order id, seen through the
//! uploader that created them. Every function here is scoped by the caller.

use crate::state::RepositoryState;
use dicomflow_core::models::{
    CollaboratorsResponse, DoctorRef, OrderBucket, OrderDetail, OrderFileEntry, OrderGroup,
    OrderSummary, UpdateOrderStatusRequest, UpdateOrderStatusResponse,
};
use dicomflow_core::AppError;
use std::collections::HashMap;
use uuid::Uuid;

const UNKNOWN_DOCTOR: &str = "Unknown";

/// Display names for `ids`; unknown ids map to "Unknown".
async fn resolve_doctors(repos: &RepositoryState, ids: &[Uuid]) -> Result<Vec<DoctorRef>, AppError> {
    let names: HashMap<Uuid, String> = repos
        .users
        .get_many(ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.display_name))
        .collect();

    Ok(ids
        .iter()
        .map(|id| DoctorRef {
            id: *id,
            name: names
                .get(id)
                .cloned()
                .unwrap_or_else(|| UNKNOWN_DOCTOR.to_string()),
        })
        .collect())
}

fn summarize(group: &OrderGroup, names: &HashMap<Uuid, String>) -> Option<OrderSummary> {
    Some(OrderSummary {
        order_id: group.order_id,
        patient_id: group.patient_id()?,
        status: group.status(),
        progress: group.progress(),
        collaborating_doctors: group
            .collaborators()
            .iter()
            .map(|id| {
                names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_DOCTOR.to_string())
            })
            .collect(),
        file_count: group.file_count(),
        creation_date: group.creation_date()?,
        last_update: group.last_update()?,
    })
}

/// The caller's orders in `bucket`, newest first.
#[tracing::instrument(skip(repos))]
pub async fn list_orders(
    repos: &RepositoryState,
    caller: Uuid,
    bucket: OrderBucket,
) -> Result<Vec<OrderSummary>, AppError> {
    let records = repos.medical_files.list_by_uploader(caller).await?;
    let groups: Vec<OrderGroup> = OrderGroup::group(records)
        .into_iter()
        .filter(|g| g.uploaded_by == caller && bucket.contains(g.status()))
        .collect();

    let mut doctor_ids: Vec<Uuid> = Vec::new();
    for id in groups.iter().flat_map(|g| g.collaborators()) {
        if !doctor_ids.contains(&id) {
            doctor_ids.push(id);
        }
    }
    let names: HashMap<Uuid, String> = resolve_doctors(repos, &doctor_ids)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    let mut summaries: Vec<OrderSummary> =
        groups.iter().filter_map(|g| summarize(g, &names)).collect();
    summaries.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));

    tracing::debug!(orders = summaries.len(), "Orders listed");
    Ok(summaries)
}

#[tracing::instrument(skip(repos))]
pub async fn get_order_details(
    repos: &RepositoryState,
    caller: Uuid,
    order_id: Uuid,
) -> Result<OrderDetail, AppError> {
    let records = repos.medical_files.list_by_order(caller, order_id).await?;
    let not_found = || AppError::NotFound(format!("Order {} not found", order_id));

    let group = OrderGroup {
        order_id,
        uploaded_by: caller,
        records,
    };
    let patient_id = group.patient_id().ok_or_else(not_found)?;
    let collaborating_doctors = resolve_doctors(repos, &group.collaborators()).await?;

    Ok(OrderDetail {
        order_id,
        patient_id,
        status: group.status(),
        progress: group.progress(),
        collaborating_doctors,
        files: group.records.iter().map(OrderFileEntry::from).collect(),
    })
}

/// Set status and progress on every record of the order in one statement.
#[tracing::instrument(skip(repos, request), fields(status = %request.status, progress = request.progress))]
pub async fn update_order_status(
    repos: &RepositoryState,
    caller: Uuid,
    order_id: Uuid,
    request: UpdateOrderStatusRequest,
) -> Result<UpdateOrderStatusResponse, AppError> {
    let updated = repos
        .medical_files
        .update_order_status(caller, order_id, request.status, request.progress)
        .await?;

    if updated == 0 {
        return Err(AppError::NotFound(format!("Order {} not found", order_id)));
    }

    tracing::info!(order_id = %order_id, updated, "Order status updated");

    Ok(UpdateOrderStatusResponse {
        order_id,
        status: request.status,
        progress: request.progress,
        updated,
    })
}

#[tracing::instrument(skip(repos))]
pub async fn add_collaborator(
    repos: &RepositoryState,
    caller: Uuid,
    order_id: Uuid,
    doctor_id: Uuid,
) -> Result<CollaboratorsResponse, AppError> {
    match repos.users.get(doctor_id).await? {
        Some(user) if user.is_doctor() => {}
        _ => return Err(AppError::NotFound(format!("Doctor {} not found", doctor_id))),
    }

    let matched = repos
        .medical_files
        .add_collaborator(caller, order_id, doctor_id)
        .await?;
    if matched == 0 {
        return Err(AppError::NotFound(format!("Order {} not found", order_id)));
    }

    let records = repos.medical_files.list_by_order(caller, order_id).await?;
    let group = OrderGroup {
        order_id,
        uploaded_by: caller,
        records,
    };

    Ok(CollaboratorsResponse {
        order_id,
        collaborating_doctors: resolve_doctors(repos, &group.collaborators()).await?,
    })
}
