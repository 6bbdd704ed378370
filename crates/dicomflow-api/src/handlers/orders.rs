use crate::auth::CallerContext;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::services::orders as order_service;
use crate::state::RepositoryState;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use dicomflow_core::models::{
    AddCollaboratorRequest, CollaboratorsResponse, ListOrdersQuery, OrderDetail, OrderSummary,
    UpdateOrderStatusRequest, UpdateOrderStatusResponse,
};
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/dicom/orders",
    tag = "orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Caller's orders, newest first", body = Vec<OrderSummary>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos),
    fields(user_id = %caller.user_id, bucket = ?query.status, operation = "list_orders")
)]
pub async fn list_orders(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let orders = order_service::list_orders(&repos, caller.user_id, query.status).await?;
    Ok(Json(orders))
}

#[utoipa::path(
    get,
    path = "/dicom/orders/{order_id}",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = OrderDetail),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos),
    fields(user_id = %caller.user_id, order_id = %order_id, operation = "get_order")
)]
pub async fn get_order(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let detail = order_service::get_order_details(&repos, caller.user_id, order_id).await?;
    Ok(Json(detail))
}

#[utoipa::path(
    patch,
    path = "/dicom/orders/{order_id}/status",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status applied to every file of the order", body = UpdateOrderStatusResponse),
        (status = 400, description = "Invalid status or progress", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a doctor", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos, request),
    fields(user_id = %caller.user_id, order_id = %order_id, operation = "update_order_status")
)]
pub async fn update_order_status(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    Path(order_id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_doctor()?;

    let response =
        order_service::update_order_status(&repos, caller.user_id, order_id, request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/dicom/orders/{order_id}/collaborators",
    tag = "orders",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    request_body = AddCollaboratorRequest,
    responses(
        (status = 200, description = "Collaborator added", body = CollaboratorsResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller is not a doctor", body = ErrorResponse),
        (status = 404, description = "Order or doctor not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[tracing::instrument(
    skip(repos, request),
    fields(
        user_id = %caller.user_id,
        order_id = %order_id,
        doctor_id = %request.doctor_id,
        operation = "add_collaborator"
    )
)]
pub async fn add_collaborator(
    caller: CallerContext,
    State(repos): State<RepositoryState>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<AddCollaboratorRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    caller.require_doctor()?;

    let response =
        order_service::add_collaborator(&repos, caller.user_id, order_id, request.doctor_id)
            .await?;
    Ok(Json(response))
}
