//! HTTP handlers for raw-material batch endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::{LedgerCheck, PaginatedResponse, Pagination, RmBatch, RmBatchWithTransactions};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::query::{RmBatchFilter, RmBatchSort, Sort};
use crate::services::rm_batch::{CreateRmBatchInput, RecordRmTransactionInput, RmPostingResult};
use crate::services::RmBatchService;
use crate::AppState;

/// List raw-material batches
pub async fn list_rm_batches(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<RmBatchFilter>,
    Query(sort): Query<Sort<RmBatchSort>>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<PaginatedResponse<RmBatch>>> {
    let service = RmBatchService::new(state.db);
    let page = service
        .list(current_user.0.plant_id, filter, sort, pagination)
        .await?;
    Ok(Json(page))
}

/// Open a raw-material batch
pub async fn create_rm_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateRmBatchInput>,
) -> AppResult<(StatusCode, Json<RmBatchWithTransactions>)> {
    let service = RmBatchService::new(state.db);
    let batch = service.create(current_user.0.plant_id, input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Get a batch with its transactions
pub async fn get_rm_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RmBatchWithTransactions>> {
    let service = RmBatchService::new(state.db);
    let batch = service.get_by_id(current_user.0.plant_id, id).await?;
    Ok(Json(batch))
}

/// Append a ledger transaction
pub async fn record_rm_transaction(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<RecordRmTransactionInput>,
) -> AppResult<(StatusCode, Json<RmPostingResult>)> {
    let service = RmBatchService::new(state.db);
    let result = service
        .record_transaction(current_user.0.plant_id, id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Check the cached quantity against the ledger
pub async fn verify_rm_batch(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<LedgerCheck>> {
    let service = RmBatchService::new(state.db);
    let check = service.verify(current_user.0.plant_id, id).await?;
    Ok(Json(check))
}
