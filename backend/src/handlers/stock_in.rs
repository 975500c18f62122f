//! HTTP handlers for stock-in endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::stock_in::{
    BulkFinishedGoodsStockInInput, FinishedGoodsStockInInput, RawMaterialStockInInput,
    StockInResult,
};
use crate::services::StockInService;
use crate::AppState;

/// Receive raw material
pub async fn stock_in_raw_material(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RawMaterialStockInInput>,
) -> AppResult<(StatusCode, Json<StockInResult>)> {
    let service = StockInService::new(state.db, state.config.stock_in.clone());
    let result = service.raw_material(current_user.0.plant_id, input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Receive one finished-goods sticker
pub async fn stock_in_finished_goods(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<FinishedGoodsStockInInput>,
) -> AppResult<(StatusCode, Json<StockInResult>)> {
    let service = StockInService::new(state.db, state.config.stock_in.clone());
    let result = service.finished_goods(current_user.0.plant_id, input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Receive many finished-goods stickers into one container
pub async fn stock_in_finished_goods_bulk(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<BulkFinishedGoodsStockInInput>,
) -> AppResult<(StatusCode, Json<StockInResult>)> {
    let service = StockInService::new(state.db, state.config.stock_in.clone());
    let result = service
        .finished_goods_bulk(current_user.0.plant_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(result)))
}
