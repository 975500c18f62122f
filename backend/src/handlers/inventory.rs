//! HTTP handlers for inventory read models

use axum::{
    extract::{Query, State},
    Json,
};
use shared::{InventoryStatistics, StockEntry};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::StockFilter;
use crate::services::InventoryService;
use crate::AppState;

/// Stock held in containers
pub async fn get_stock(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<StockFilter>,
) -> AppResult<Json<Vec<StockEntry>>> {
    let service = InventoryService::new(state.db);
    let stock = service.stock(current_user.0.plant_id, filter).await?;
    Ok(Json(stock))
}

/// Container and product totals for the plant
pub async fn get_inventory_statistics(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<InventoryStatistics>> {
    let service = InventoryService::new(state.db);
    let stats = service.statistics(current_user.0.plant_id).await?;
    Ok(Json(stats))
}
