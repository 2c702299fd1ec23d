//! Reporting service: bucketed sales and stock movement reports

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, FixedOffset};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    aggregate, AggregateInput, Bucketing, DateRange, Dimension, LowStockAlert, MovementEntry,
    PeriodComparison, Product, ReportBucket, ReportMetric, ReportWindow, Sale, SaleLine,
};

use crate::config::ReportingConfig;
use crate::error::{AppError, AppResult};
use crate::external::TransactionStore;
use crate::services::{LedgerReader, StockService};

const MIN_REPORT_YEAR: i32 = 1;
const MAX_REPORT_YEAR: i32 = 9999;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn TransactionStore>,
    ledger: LedgerReader,
    offset: FixedOffset,
    low_stock_limit: usize,
    max_range_days: i64,
}

/// A bucketed report with its vs-previous-period comparison
#[derive(Debug, Serialize)]
pub struct AggregateReport {
    pub metric: ReportMetric,
    pub bucketing: Bucketing,
    pub dimension: Dimension,
    pub range: DateRange,
    pub buckets: Vec<ReportBucket>,
    pub comparison: PeriodComparison,
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub range: DateRange,
    pub revenue: PeriodComparison,
    pub units_sold: PeriodComparison,
    pub stock_movement: PeriodComparison,
    pub daily_revenue: Vec<ReportBucket>,
    pub low_stock: Vec<LowStockAlert>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn TransactionStore>, config: &ReportingConfig) -> Self {
        Self {
            ledger: LedgerReader::new(store.clone()),
            store,
            offset: config.offset(),
            low_stock_limit: config.low_stock_limit,
            max_range_days: config.max_range_days,
        }
    }

    /// Bucket one metric over a date range and compare it with the
    /// equal-length period just before
    pub async fn aggregate_report(
        &self,
        range: DateRange,
        bucketing: Bucketing,
        dimension: Dimension,
        metric: ReportMetric,
    ) -> AppResult<AggregateReport> {
        let (window, span) = self.window(&range)?;
        let inputs = self.inputs(metric, &span).await?;

        Ok(AggregateReport {
            metric,
            bucketing,
            dimension,
            range,
            buckets: aggregate(&inputs, bucketing, dimension, self.offset, Some(&window)),
            comparison: PeriodComparison::over(&inputs, &window),
        })
    }

    /// Headline metrics for the dashboard.
    ///
    /// Each metric is computed by its own task over its own inputs.
    pub async fn dashboard(&self, range: DateRange) -> AppResult<DashboardMetrics> {
        let (window, span) = self.window(&range)?;
        let stock = StockService::new(self.store.clone());

        let (revenue, units_sold, movements, low_stock) = tokio::try_join!(
            self.inputs(ReportMetric::Revenue, &span),
            self.inputs(ReportMetric::UnitsSold, &span),
            self.inputs(ReportMetric::StockMovement, &span),
            stock.low_stock_alerts(self.low_stock_limit),
        )?;

        Ok(DashboardMetrics {
            range,
            revenue: PeriodComparison::over(&revenue, &window),
            units_sold: PeriodComparison::over(&units_sold, &window),
            stock_movement: PeriodComparison::over(&movements, &window),
            daily_revenue: aggregate(
                &revenue,
                Bucketing::Daily,
                Dimension::None,
                self.offset,
                Some(&window),
            ),
            low_stock,
        })
    }

    /// The requested window and the span covering it plus the previous period
    fn window(&self, range: &DateRange) -> AppResult<(ReportWindow, ReportWindow)> {
        if range.end < range.start {
            return Err(AppError::validation(
                "end_date",
                "End date must not be before start date",
            ));
        }
        if range.start.year() < MIN_REPORT_YEAR {
            return Err(AppError::validation("start_date", "Start date is out of range"));
        }
        if range.end.year() > MAX_REPORT_YEAR {
            return Err(AppError::validation("end_date", "End date is out of range"));
        }
        if range.days() > self.max_range_days {
            return Err(AppError::validation(
                "start_date",
                format!("Report range must not exceed {} days", self.max_range_days),
            ));
        }

        let window = ReportWindow::from_dates(range, self.offset)
            .ok_or_else(|| AppError::validation("start_date", "Date range is out of range"))?;
        let previous = window.previous().ok_or_else(|| {
            AppError::validation("start_date", "Start date is out of range")
        })?;

        Ok((window, ReportWindow::new(previous.start, window.end)))
    }

    async fn inputs(&self, metric: ReportMetric, span: &ReportWindow) -> AppResult<Vec<AggregateInput>> {
        match metric {
            ReportMetric::Revenue | ReportMetric::UnitsSold => {
                let ((sales, lines), products) =
                    tokio::try_join!(self.ledger.sales_in(span), self.products())?;
                Ok(sale_inputs(&sales, &lines, &products, metric))
            }
            ReportMetric::StockMovement => {
                let (normalized, products) =
                    tokio::try_join!(self.ledger.entries(), self.products())?;
                let in_span: Vec<MovementEntry> = normalized
                    .entries
                    .into_iter()
                    .filter(|e| span.contains(e.occurred_at))
                    .collect();
                Ok(movement_inputs(&in_span, &products))
            }
        }
    }

    async fn products(&self) -> AppResult<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }
}

/// Aggregator rows for sold lines; lines whose sale is unknown are skipped
pub fn sale_inputs(
    sales: &[Sale],
    lines: &[SaleLine],
    products: &[Product],
    metric: ReportMetric,
) -> Vec<AggregateInput> {
    let headers: HashMap<i64, &Sale> = sales.iter().map(|s| (s.id, s)).collect();
    let categories = categories(products);

    lines
        .iter()
        .filter_map(|line| {
            let sale = headers.get(&line.sale_id)?;
            let value = match metric {
                ReportMetric::UnitsSold => Decimal::from(line.quantity),
                _ => line.total(),
            };
            Some(AggregateInput {
                occurred_at: sale.transaction_date,
                value,
                category: line
                    .product_id
                    .and_then(|id| categories.get(&id).cloned().flatten()),
                staff: sale.staff_name.clone(),
                payment_method: sale.payment_method.clone(),
            })
        })
        .collect()
}

/// Aggregator rows for signed movement quantities
pub fn movement_inputs(entries: &[MovementEntry], products: &[Product]) -> Vec<AggregateInput> {
    let categories = categories(products);

    entries
        .iter()
        .map(|entry| AggregateInput {
            category: categories.get(&entry.product_id).cloned().flatten(),
            ..AggregateInput::new(entry.occurred_at, Decimal::from(entry.quantity))
        })
        .collect()
}

fn categories(products: &[Product]) -> HashMap<i64, Option<String>> {
    products.iter().map(|p| (p.id, p.category.clone())).collect()
}
