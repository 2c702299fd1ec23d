//! Route definitions for the Bike Shop Inventory Platform

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Stock, history and reorder
        .nest("/inventory", inventory_routes())
        // Stock adjustments
        .route("/adjustments", post(handlers::submit_adjustment))
        // Return workflow
        .nest("/returns", return_routes())
        // Dashboard reports
        .nest("/reports", reporting_routes())
}

/// Inventory routes
fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/stock-levels", get(handlers::list_stock_levels))
        .route("/alerts/low-stock", get(handlers::list_low_stock))
        .route("/products/:id/stock", get(handlers::get_stock))
        .route("/products/:id/history", get(handlers::get_history))
        .route(
            "/products/:id/history/edits",
            post(handlers::submit_history_edits),
        )
        .route("/products/:id/reorder", get(handlers::get_reorder_draft))
}

/// Return routes
fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_returns).post(handlers::create_return))
        .route("/:id", get(handlers::get_return))
        .route("/:id/approve", post(handlers::approve_return))
        .route("/:id/post", post(handlers::post_return))
        .route("/:id/reject", post(handlers::reject_return))
}

/// Reporting routes
fn reporting_routes() -> Router<AppState> {
    Router::new()
        .route("/aggregate", get(handlers::get_aggregate_report))
        .route("/dashboard", get(handlers::get_dashboard))
}
