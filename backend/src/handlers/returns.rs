//! HTTP handlers for the return workflow

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{NewReturn, ReturnRecord};
use validator::Validate;

use crate::error::AppResult;
use crate::services::returns::ReturnPostOutcome;
use crate::services::ReturnService;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReturnInput {
    #[validate(range(min = 1))]
    pub sale_detail_id: i64,
    #[validate(range(min = 1, message = "Return quantity must be positive"))]
    pub quantity: i64,
    #[validate(range(min = 1))]
    pub replacement_product_id: Option<i64>,
    pub transaction_date: Option<DateTime<Utc>>,
    #[validate(length(max = 500))]
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostReturnInput {
    #[validate(length(min = 1, max = 64))]
    pub idempotency_key: String,
}

/// Open a return request
pub async fn create_return(
    State(state): State<AppState>,
    Json(input): Json<CreateReturnInput>,
) -> AppResult<Json<ReturnRecord>> {
    input.validate()?;

    let service = ReturnService::new(state.store);
    let record = service
        .create(NewReturn {
            sale_detail_id: input.sale_detail_id,
            quantity: input.quantity,
            replacement_product_id: input.replacement_product_id,
            transaction_date: input.transaction_date.unwrap_or_else(Utc::now),
            remarks: input.remarks,
        })
        .await?;
    Ok(Json(record))
}

/// List return requests
pub async fn list_returns(State(state): State<AppState>) -> AppResult<Json<Vec<ReturnRecord>>> {
    let service = ReturnService::new(state.store);
    let records = service.list().await?;
    Ok(Json(records))
}

/// Get a return request
pub async fn get_return(
    State(state): State<AppState>,
    Path(return_id): Path<i64>,
) -> AppResult<Json<ReturnRecord>> {
    let service = ReturnService::new(state.store);
    let record = service.get(return_id).await?;
    Ok(Json(record))
}

/// Approve a pending return
pub async fn approve_return(
    State(state): State<AppState>,
    Path(return_id): Path<i64>,
) -> AppResult<Json<ReturnRecord>> {
    let service = ReturnService::new(state.store);
    let record = service.approve(return_id).await?;
    Ok(Json(record))
}

/// Post an approved return so it affects stock
pub async fn post_return(
    State(state): State<AppState>,
    Path(return_id): Path<i64>,
    Json(input): Json<PostReturnInput>,
) -> AppResult<Json<ReturnPostOutcome>> {
    input.validate()?;

    let service = ReturnService::new(state.store);
    let outcome = service.post(return_id, &input.idempotency_key).await?;
    Ok(Json(outcome))
}

/// Reject a pending or approved return
pub async fn reject_return(
    State(state): State<AppState>,
    Path(return_id): Path<i64>,
) -> AppResult<Json<ReturnRecord>> {
    let service = ReturnService::new(state.store);
    let record = service.reject(return_id).await?;
    Ok(Json(record))
}
