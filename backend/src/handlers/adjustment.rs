//! HTTP handlers for stock adjustments

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use shared::{AdjustmentType, PostOutcome};
use validator::Validate;

use crate::error::AppResult;
use crate::services::AdjustmentService;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAdjustmentInput {
    #[validate(range(min = 1, message = "Product id must be positive"))]
    pub product_id: i64,
    pub net_delta: i64,
    #[serde(default)]
    pub adjustment_type: AdjustmentType,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub remarks: String,
    /// Sent again when retrying the same user action
    #[validate(length(min = 1, max = 64))]
    pub client_request_id: Option<String>,
}

/// Adjust a product's stock by a net delta.
///
/// 201 when the adjustment was written, 200 when the request id was already applied.
pub async fn submit_adjustment(
    State(state): State<AppState>,
    Json(input): Json<SubmitAdjustmentInput>,
) -> AppResult<(StatusCode, Json<PostOutcome>)> {
    input.validate()?;

    let service = AdjustmentService::new(state.store);
    let outcome = service
        .submit_adjustment(
            input.product_id,
            input.net_delta,
            input.adjustment_type,
            input.remarks,
            input.client_request_id,
        )
        .await?;
    Ok((outcome_status(&outcome), Json(outcome)))
}

pub(crate) fn outcome_status(outcome: &PostOutcome) -> StatusCode {
    if outcome.is_duplicate() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    }
}
