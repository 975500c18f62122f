//! HTTP handlers for sticker lookups and reprints

use axum::{
    extract::{Path, State},
    Json,
};
use shared::Sticker;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::StickerService;
use crate::AppState;

/// Get a sticker by barcode
pub async fn get_sticker(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(barcode): Path<String>,
) -> AppResult<Json<Sticker>> {
    let service = StickerService::new(state.db, state.config.stickers.policy());
    let sticker = service
        .get_by_barcode(current_user.0.plant_id, &barcode)
        .await?;
    Ok(Json(sticker))
}

/// Record a reprint of a sticker
pub async fn record_sticker_print(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(barcode): Path<String>,
) -> AppResult<Json<Sticker>> {
    let service = StickerService::new(state.db, state.config.stickers.policy());
    let sticker = service
        .record_print(current_user.0.plant_id, &barcode)
        .await?;
    Ok(Json(sticker))
}
