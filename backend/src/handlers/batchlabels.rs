//! HTTP handlers for batchlabel and sticker issuance endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{Batchlabel, PaginatedResponse, Pagination, Sticker};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::batchlabel::{BatchlabelDetail, CreateBatchlabelInput};
use crate::services::query::{BatchlabelFilter, BatchlabelSort, Sort, StickerFilter};
use crate::services::sticker::{CreateStickersInput, IssuedStickers, ShiftCount, ShiftCountQuery};
use crate::services::{BatchlabelService, StickerService};
use crate::AppState;

/// List batchlabels
pub async fn list_batchlabels(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<BatchlabelFilter>,
    Query(sort): Query<Sort<BatchlabelSort>>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Batchlabel>>> {
    let service = BatchlabelService::new(state.db);
    let page = service
        .list(current_user.0.plant_id, filter, sort, pagination)
        .await?;
    Ok(Json(page))
}

/// Create a batchlabel
pub async fn create_batchlabel(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBatchlabelInput>,
) -> AppResult<(StatusCode, Json<BatchlabelDetail>)> {
    let service = BatchlabelService::new(state.db);
    let detail = service.create(current_user.0.plant_id, input).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Get a batchlabel with its sticker issuance
pub async fn get_batchlabel(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BatchlabelDetail>> {
    let service = BatchlabelService::new(state.db);
    let detail = service.get(current_user.0.plant_id, id).await?;
    Ok(Json(detail))
}

/// List the stickers of a batchlabel
pub async fn list_batch_stickers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(filter): Query<StickerFilter>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<Sticker>>> {
    let service = StickerService::new(state.db, state.config.stickers.policy());
    let filter = StickerFilter {
        batchlabel_id: Some(id),
        ..filter
    };
    let page = service
        .list(current_user.0.plant_id, filter, pagination)
        .await?;
    Ok(Json(page))
}

/// Issue stickers for a batchlabel
pub async fn create_stickers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<CreateStickersInput>,
) -> AppResult<(StatusCode, Json<IssuedStickers>)> {
    let service = StickerService::new(state.db, state.config.stickers.policy());
    let issued = service
        .create_stickers(current_user.0.plant_id, id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Count stickers issued in a shift on a day
pub async fn get_shift_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Query(query): Query<ShiftCountQuery>,
) -> AppResult<Json<ShiftCount>> {
    let service = StickerService::new(state.db, state.config.stickers.policy());
    let count = service
        .count_for_shift(current_user.0.plant_id, id, query)
        .await?;
    Ok(Json(count))
}
