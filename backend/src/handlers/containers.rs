//! HTTP handlers for container endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{ApprovalReport, Container, ContainerDetail, PaginatedResponse, Pagination};

use crate::error::AppResult;
use crate::middleware::{CurrentUser, CONTAINER_APPROVE};
use crate::services::approval::BulkApprovalInput;
use crate::services::container::{
    AttachLocationInput, CreateContainerInput, UnloadInput, UpdateContainerInput,
};
use crate::services::query::{ContainerFilter, ContainerSort, Sort};
use crate::services::{ApprovalService, ContainerService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ContainerDetailQuery {
    #[serde(default)]
    pub include_content: bool,
}

/// List containers
pub async fn list_containers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ContainerFilter>,
    Query(sort): Query<Sort<ContainerSort>>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Container>>> {
    let service = ContainerService::new(state.db);
    let page = service
        .list(current_user.0.plant_id, filter, sort, pagination)
        .await?;
    Ok(Json(page))
}

/// Create an empty container
pub async fn create_container(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateContainerInput>,
) -> AppResult<(StatusCode, Json<Container>)> {
    let service = ContainerService::new(state.db);
    let container = service.create(current_user.0.plant_id, input).await?;
    Ok((StatusCode::CREATED, Json(container)))
}

/// Get a container by code
pub async fn get_container(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
    Query(query): Query<ContainerDetailQuery>,
) -> AppResult<Json<ContainerDetail>> {
    let service = ContainerService::new(state.db);
    let detail = service
        .get_by_code(current_user.0.plant_id, &code, query.include_content)
        .await?;
    Ok(Json(detail))
}

/// Update a container's name, address or enabled status
pub async fn update_container(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
    Json(input): Json<UpdateContainerInput>,
) -> AppResult<Json<Container>> {
    let service = ContainerService::new(state.db);
    let container = service.update(current_user.0.plant_id, &code, input).await?;
    Ok(Json(container))
}

/// Delete a container with its contents
pub async fn delete_container(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
) -> AppResult<StatusCode> {
    let service = ContainerService::new(state.db);
    service.delete(current_user.0.plant_id, &code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a non-empty container full
pub async fn mark_container_full(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
) -> AppResult<Json<Container>> {
    let service = ContainerService::new(state.db);
    let container = service.mark_full(current_user.0.plant_id, &code).await?;
    Ok(Json(container))
}

/// Release stock from a content row
pub async fn unload_container(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
    Json(input): Json<UnloadInput>,
) -> AppResult<Json<ContainerDetail>> {
    let service = ContainerService::new(state.db);
    let detail = service.unload(current_user.0.plant_id, &code, input).await?;
    Ok(Json(detail))
}

/// Attach a container to a store location
pub async fn attach_container_location(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
    Json(input): Json<AttachLocationInput>,
) -> AppResult<Json<ContainerDetail>> {
    let service = ContainerService::new(state.db);
    let detail = service
        .attach_to_location(current_user.0.plant_id, &code, input)
        .await?;
    Ok(Json(detail))
}

/// List containers waiting for approval
pub async fn list_pending_containers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<ContainerFilter>,
    Query(sort): Query<Sort<ContainerSort>>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Container>>> {
    let service = ApprovalService::new(state.db);
    let page = service
        .pending_containers(current_user.0.plant_id, filter, sort, pagination)
        .await?;
    Ok(Json(page))
}

/// Approve one container
pub async fn approve_container(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(code): Path<String>,
) -> AppResult<Json<ApprovalReport>> {
    current_user.0.require(CONTAINER_APPROVE)?;
    let service = ApprovalService::new(state.db);
    let report = service
        .approve_container(current_user.0.plant_id, &code)
        .await?;
    Ok(Json(report))
}

/// Approve containers in bulk
pub async fn approve_containers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkApprovalInput>,
) -> AppResult<Json<ApprovalReport>> {
    current_user.0.require(CONTAINER_APPROVE)?;
    let service = ApprovalService::new(state.db);
    let report = service
        .approve_containers(current_user.0.plant_id, input)
        .await?;
    Ok(Json(report))
}
