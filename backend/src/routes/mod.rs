//! Route definitions for the warehouse API

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes
        .nest("/containers", container_routes(state.clone()))
        .nest("/stock-in", stock_in_routes(state.clone()))
        .nest("/requisitions", requisition_routes(state.clone()))
        .nest("/batchlabels", batchlabel_routes(state.clone()))
        .nest("/stickers", sticker_routes(state.clone()))
        .nest("/rm-batches", rm_batch_routes(state.clone()))
        .nest("/inventory", inventory_routes(state))
}

/// Container routes (protected)
fn container_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_containers).post(handlers::create_container))
        .route("/pending", get(handlers::list_pending_containers))
        .route("/approve", post(handlers::approve_containers))
        .route(
            "/:code",
            get(handlers::get_container)
                .put(handlers::update_container)
                .delete(handlers::delete_container),
        )
        .route("/:code/approve", post(handlers::approve_container))
        .route("/:code/full", post(handlers::mark_container_full))
        .route("/:code/unload", post(handlers::unload_container))
        .route("/:code/location", put(handlers::attach_container_location))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock-in routes (protected)
fn stock_in_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/raw-material", post(handlers::stock_in_raw_material))
        .route("/finished-goods", post(handlers::stock_in_finished_goods))
        .route("/finished-goods/bulk", post(handlers::stock_in_finished_goods_bulk))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Requisition routes (protected)
fn requisition_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_requisitions).post(handlers::create_requisition))
        .route("/pending", get(handlers::list_pending_requisitions))
        .route("/approve", post(handlers::approve_requisitions))
        .route(
            "/:id",
            get(handlers::get_requisition)
                .put(handlers::update_requisition)
                .delete(handlers::delete_requisition),
        )
        .route("/:id/approve", post(handlers::approve_requisition))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Batchlabel and sticker issuance routes (protected)
fn batchlabel_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_batchlabels).post(handlers::create_batchlabel))
        .route("/:id", get(handlers::get_batchlabel))
        .route(
            "/:id/stickers",
            get(handlers::list_batch_stickers).post(handlers::create_stickers),
        )
        .route("/:id/shift-count", get(handlers::get_shift_count))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Sticker routes (protected)
fn sticker_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/:barcode", get(handlers::get_sticker))
        .route("/:barcode/print", post(handlers::record_sticker_print))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Raw-material batch routes (protected)
fn rm_batch_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_rm_batches).post(handlers::create_rm_batch))
        .route("/:id", get(handlers::get_rm_batch))
        .route("/:id/transactions", post(handlers::record_rm_transaction))
        .route("/:id/verify", get(handlers::verify_rm_batch))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Inventory routes (protected)
fn inventory_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stock", get(handlers::get_stock))
        .route("/statistics", get(handlers::get_inventory_statistics))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
