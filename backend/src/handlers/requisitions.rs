//! HTTP handlers for requisition endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{ApprovalReport, PaginatedResponse, Pagination, Requisition, RequisitionWithItems};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::approval::BulkApprovalInput;
use crate::services::query::{RequisitionFilter, RequisitionSort, Sort};
use crate::services::requisition::RequisitionInput;
use crate::services::{ApprovalService, RequisitionService};
use crate::AppState;

/// List requisitions
pub async fn list_requisitions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RequisitionFilter>,
    Query(sort): Query<Sort<RequisitionSort>>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Requisition>>> {
    let service = RequisitionService::new(state.db);
    let page = service
        .list(current_user.0.plant_id, filter, sort, pagination)
        .await?;
    Ok(Json(page))
}

/// Create a requisition
pub async fn create_requisition(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RequisitionInput>,
) -> AppResult<(StatusCode, Json<RequisitionWithItems>)> {
    let service = RequisitionService::new(state.db);
    let requisition = service
        .create(current_user.0.plant_id, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(requisition)))
}

/// Get a requisition with its items
pub async fn get_requisition(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequisitionWithItems>> {
    let service = RequisitionService::new(state.db);
    let requisition = service.get(current_user.0.plant_id, id).await?;
    Ok(Json(requisition))
}

/// Update a requisition, replacing its items
pub async fn update_requisition(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RequisitionInput>,
) -> AppResult<Json<RequisitionWithItems>> {
    let service = RequisitionService::new(state.db);
    let requisition = service.update(current_user.0.plant_id, id, input).await?;
    Ok(Json(requisition))
}

/// Delete a requisition
pub async fn delete_requisition(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = RequisitionService::new(state.db);
    service.delete(current_user.0.plant_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Requisitions waiting for the current user's approval
pub async fn list_pending_requisitions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RequisitionFilter>,
    Query(sort): Query<Sort<RequisitionSort>>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Requisition>>> {
    let service = ApprovalService::new(state.db);
    let page = service
        .pending_requisitions(
            current_user.0.plant_id,
            current_user.0.user_id,
            filter,
            sort,
            pagination,
        )
        .await?;
    Ok(Json(page))
}

/// Approve one requisition
pub async fn approve_requisition(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApprovalReport>> {
    let service = ApprovalService::new(state.db);
    let report = service
        .approve_requisition(current_user.0.plant_id, current_user.0.user_id, id)
        .await?;
    Ok(Json(report))
}

/// Approve requisitions in bulk
pub async fn approve_requisitions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkApprovalInput>,
) -> AppResult<Json<ApprovalReport>> {
    let service = ApprovalService::new(state.db);
    let report = service
        .approve_requisitions(current_user.0.plant_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(report))
}
