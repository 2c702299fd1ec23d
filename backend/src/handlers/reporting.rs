//! Reporting handlers for dashboard charts

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::{Bucketing, DateRange, Dimension, ReportMetric};

use crate::error::AppResult;
use crate::services::reporting::{AggregateReport, DashboardMetrics};
use crate::services::ReportingService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AggregateQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub bucketing: Bucketing,
    #[serde(default)]
    pub dimension: Dimension,
    #[serde(default)]
    pub metric: ReportMetric,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Bucketed report for one metric
pub async fn get_aggregate_report(
    State(state): State<AppState>,
    Query(query): Query<AggregateQuery>,
) -> AppResult<Json<AggregateReport>> {
    let service = ReportingService::new(state.store, &state.config.reporting);
    let report = service
        .aggregate_report(
            DateRange::new(query.start_date, query.end_date),
            query.bucketing,
            query.dimension,
            query.metric,
        )
        .await?;
    Ok(Json(report))
}

/// Get dashboard metrics
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardMetrics>> {
    let service = ReportingService::new(state.store, &state.config.reporting);
    let metrics = service
        .dashboard(DateRange::new(query.start_date, query.end_date))
        .await?;
    Ok(Json(metrics))
}
