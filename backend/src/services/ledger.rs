//! Ledger reader: fetches every raw transaction stream and normalizes it
//! into movement entries

use std::sync::Arc;

use shared::{
    normalize, MovementEntry, Normalized, ReportWindow, Sale, SaleLine, StockoutRecord,
    TransactionSet,
};

use crate::error::AppResult;
use crate::external::{AdjustmentFilter, TransactionStore};

/// Reads the movement ledger from the transaction store
#[derive(Clone)]
pub struct LedgerReader {
    store: Arc<dyn TransactionStore>,
}

impl LedgerReader {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Fetch all raw records, each line resolved against its header
    pub async fn fetch(&self) -> AppResult<TransactionSet> {
        let all_adjustments = AdjustmentFilter::default();
        let (supplies, sales, stockouts, adjustments, returns) = tokio::try_join!(
            self.store.list_supplies(),
            self.store.list_sales(None),
            self.store.list_stockouts(),
            self.store.list_adjustments(&all_adjustments),
            self.store.list_returns(),
        )?;

        // Lines come per listed header, so each one resolves to its header
        let mut supply_lines = Vec::new();
        for supply in &supplies {
            supply_lines.extend(self.store.list_supply_lines(supply.id).await?);
        }

        let sale_lines = self.sale_lines(&sales).await?;

        let mut stockout_records = Vec::with_capacity(stockouts.len());
        for header in stockouts {
            let lines = self.store.list_stockout_lines(header.id).await?;
            stockout_records.push(StockoutRecord { header, lines });
        }

        tracing::debug!(
            supplies = supplies.len(),
            sales = sales.len(),
            stockouts = stockout_records.len(),
            adjustments = adjustments.len(),
            returns = returns.len(),
            "Fetched transaction streams"
        );

        Ok(TransactionSet {
            supplies,
            supply_lines,
            sales,
            sale_lines,
            stockouts: stockout_records,
            adjustments,
            returns,
        })
    }

    /// Normalize the full ledger; malformed records are logged and skipped
    pub async fn entries(&self) -> AppResult<Normalized> {
        let set = self.fetch().await?;
        let normalized = normalize(&set);

        for dropped in &normalized.dropped {
            tracing::warn!(
                kind = %dropped.kind,
                source_ref = %dropped.source_ref,
                "Skipping malformed record: {}",
                dropped.reason
            );
        }

        Ok(normalized)
    }

    /// Entries of one product, in stream order
    pub async fn product_entries(&self, product_id: i64) -> AppResult<Vec<MovementEntry>> {
        Ok(self.entries().await?.for_product(product_id))
    }

    /// Sales inside a window together with their lines
    pub async fn sales_in(&self, window: &ReportWindow) -> AppResult<(Vec<Sale>, Vec<SaleLine>)> {
        let sales = self.store.list_sales(Some(window)).await?;
        let lines = self.sale_lines(&sales).await?;
        Ok((sales, lines))
    }

    async fn sale_lines(&self, sales: &[Sale]) -> AppResult<Vec<SaleLine>> {
        let mut lines = Vec::new();
        for sale in sales {
            lines.extend(self.store.list_sale_lines(sale.id).await?);
        }
        Ok(lines)
    }
}
