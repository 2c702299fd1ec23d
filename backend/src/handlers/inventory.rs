//! HTTP handlers for stock, history and reorder endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::{LowStockAlert, MovementEntry, PaginatedResponse, PostOutcome, RowEdit};
use validator::Validate;

use crate::error::AppResult;
use crate::handlers::adjustment::outcome_status;
use crate::services::stock::{ProductStockLevel, ReorderDraft, StockSnapshot};
use crate::services::{AdjustmentService, HistoryService, StockService};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct LowStockQuery {
    pub limit: Option<usize>,
}

/// Edited history rows submitted from the stock adjustment screen
#[derive(Debug, Deserialize, Validate)]
pub struct HistoryEditsInput {
    #[validate(length(min = 1, message = "At least one edited row is required"))]
    pub edits: Vec<RowEdit>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub client_request_id: Option<String>,
}

/// Projected stock of a product
pub async fn get_stock(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<StockSnapshot>> {
    let service = StockService::new(state.store);
    let snapshot = service.snapshot(product_id).await?;
    Ok(Json(snapshot))
}

/// Movement history of a product, newest first
pub async fn get_history(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<PaginatedResponse<MovementEntry>>> {
    let service = HistoryService::new(state.store);
    let page = service
        .history(
            product_id,
            query.page.unwrap_or(1),
            query
                .per_page
                .unwrap_or(state.config.reporting.history_page_size),
        )
        .await?;
    Ok(Json(page))
}

/// Post the net of edited history rows as one correcting adjustment
pub async fn submit_history_edits(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Json(input): Json<HistoryEditsInput>,
) -> AppResult<(StatusCode, Json<PostOutcome>)> {
    input.validate()?;

    let service = AdjustmentService::new(state.store);
    let outcome = service
        .submit_edits(product_id, input.edits, input.remarks, input.client_request_id)
        .await?;
    Ok((outcome_status(&outcome), Json(outcome)))
}

/// Purchase order draft for a product
pub async fn get_reorder_draft(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<ReorderDraft>> {
    let service = StockService::new(state.store);
    let draft = service.reorder_draft(product_id).await?;
    Ok(Json(draft))
}

/// Stock of every product
pub async fn list_stock_levels(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<ProductStockLevel>>> {
    let service = StockService::new(state.store);
    let levels = service.stock_levels().await?;
    Ok(Json(levels))
}

/// Low-stock alert list
pub async fn list_low_stock(
    State(state): State<AppState>,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<Vec<LowStockAlert>>> {
    let limit = query.limit.unwrap_or(state.config.reporting.low_stock_limit);
    let service = StockService::new(state.store);
    let alerts = service.low_stock_alerts(limit).await?;
    Ok(Json(alerts))
}
