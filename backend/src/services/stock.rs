//! Stock projection and low-stock detection

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{
    available_stock, classify_stock, latest_supplier, low_stock_alerts, project_quantity,
    stock_levels, LowStockAlert, Product, StockStatus, SupplierMapping,
};

use crate::error::{AppError, AppResult};
use crate::external::TransactionStore;
use crate::services::LedgerReader;

/// Stock service: derives quantity on hand from the movement ledger
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn TransactionStore>,
    ledger: LedgerReader,
}

/// Current stock of one product
#[derive(Debug, Clone, Serialize)]
pub struct StockSnapshot {
    pub product_id: i64,
    pub product_name: String,
    pub reorder_level: i64,
    /// Sum of all movements; may be negative
    pub projected_quantity: i64,
    /// Projected quantity clamped at zero for display
    pub available_stock: i64,
    pub status: StockStatus,
    /// Precomputed figure kept by the store, if any
    pub stored_quantity_on_hand: Option<i64>,
    /// `projected_quantity - stored_quantity_on_hand`
    pub drift: Option<i64>,
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// One row of the per-product stock level list
#[derive(Debug, Clone, Serialize)]
pub struct ProductStockLevel {
    pub product_id: i64,
    pub product_name: String,
    pub category: Option<String>,
    pub quantity: i64,
    pub available_stock: i64,
    pub reorder_level: i64,
    pub status: StockStatus,
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// Pre-filled purchase order for a product
#[derive(Debug, Clone, Serialize)]
pub struct ReorderDraft {
    pub product_id: i64,
    pub product_name: String,
    pub current_stock: i64,
    pub reorder_level: i64,
    pub status: StockStatus,
    pub suggested_quantity: i64,
    pub supplier: Option<SupplierMapping>,
    pub supplier_contact: Option<String>,
    pub estimated_cost: Option<Decimal>,
}

/// Quantity that tops stock up to twice the reorder level, at least one unit
pub fn suggested_order_quantity(stock: i64, reorder_level: i64) -> i64 {
    (reorder_level * 2 - stock).max(1)
}

impl StockService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            ledger: LedgerReader::new(store.clone()),
            store,
        }
    }

    /// Projected quantity on hand; zero when the product has no movements
    pub async fn project_stock(&self, product_id: i64) -> AppResult<i64> {
        let (_, normalized) = tokio::try_join!(self.product(product_id), self.ledger.entries())?;
        Ok(project_quantity(&normalized.entries, product_id))
    }

    /// Out / Low / In classification of the projected quantity
    pub async fn classify(&self, product_id: i64) -> AppResult<StockStatus> {
        let (product, normalized) =
            tokio::try_join!(self.product(product_id), self.ledger.entries())?;
        let stock = project_quantity(&normalized.entries, product_id);
        Ok(classify_stock(stock, product.reorder_level))
    }

    /// Projected stock next to the store's own figure
    pub async fn snapshot(&self, product_id: i64) -> AppResult<StockSnapshot> {
        let (product, stored, entries) = tokio::try_join!(
            self.product(product_id),
            async {
                self.store
                    .get_quantity_on_hand(product_id)
                    .await
                    .map_err(AppError::from)
            },
            self.ledger.product_entries(product_id),
        )?;

        let projected = project_quantity(&entries, product_id);
        let drift = stored.map(|s| projected - s);
        if let Some(drift) = drift.filter(|d| *d != 0) {
            tracing::warn!(
                product_id,
                projected,
                drift,
                "Stored quantity on hand disagrees with the ledger"
            );
        }

        Ok(StockSnapshot {
            product_id,
            product_name: product.name,
            reorder_level: product.reorder_level,
            projected_quantity: projected,
            available_stock: available_stock(projected),
            status: classify_stock(projected, product.reorder_level),
            stored_quantity_on_hand: stored,
            drift,
            last_movement_at: entries.iter().map(|e| e.occurred_at).max(),
        })
    }

    /// Stock of every product, projected in one pass over the ledger
    pub async fn stock_levels(&self) -> AppResult<Vec<ProductStockLevel>> {
        let (products, normalized) =
            tokio::try_join!(self.products(), self.ledger.entries())?;
        let levels = stock_levels(&normalized.entries);

        Ok(products
            .into_iter()
            .map(|p| {
                let level = levels.get(&p.id);
                let quantity = level.map(|l| l.quantity).unwrap_or(0);
                ProductStockLevel {
                    product_id: p.id,
                    status: classify_stock(quantity, p.reorder_level),
                    available_stock: available_stock(quantity),
                    last_movement_at: level.and_then(|l| l.last_movement_at),
                    product_name: p.name,
                    category: p.category,
                    quantity,
                    reorder_level: p.reorder_level,
                }
            })
            .collect())
    }

    /// Products at or below their reorder level, lowest stock first
    pub async fn low_stock_alerts(&self, limit: usize) -> AppResult<Vec<LowStockAlert>> {
        let (products, normalized) =
            tokio::try_join!(self.products(), self.ledger.entries())?;
        let levels = stock_levels(&normalized.entries);

        Ok(low_stock_alerts(
            &products,
            |id| levels.get(&id).map(|l| l.quantity).unwrap_or(0),
            limit,
        ))
    }

    /// Supplier of the product's most recent supply
    pub async fn supplier_mapping(&self, product_id: i64) -> AppResult<Option<SupplierMapping>> {
        let set = self.ledger.fetch().await?;
        Ok(latest_supplier(&set.supplies, &set.supply_lines, product_id))
    }

    /// Purchase order draft for restocking a product
    pub async fn reorder_draft(&self, product_id: i64) -> AppResult<ReorderDraft> {
        let (product, set) = tokio::try_join!(self.product(product_id), self.ledger.fetch())?;

        let normalized = shared::normalize(&set);
        let stock = project_quantity(&normalized.entries, product_id);
        let supplier = latest_supplier(&set.supplies, &set.supply_lines, product_id);

        let supplier_contact = match &supplier {
            Some(mapping) => self.store.get_supply(mapping.supply_id).await?.supplier_contact,
            None => None,
        };

        let suggested_quantity = suggested_order_quantity(stock, product.reorder_level);
        let estimated_cost = supplier
            .as_ref()
            .and_then(|s| s.last_unit_cost)
            .map(|cost| cost * Decimal::from(suggested_quantity));

        tracing::debug!(product_id, stock, suggested_quantity, "Prepared reorder draft");

        Ok(ReorderDraft {
            product_id,
            product_name: product.name,
            current_stock: stock,
            reorder_level: product.reorder_level,
            status: classify_stock(stock, product.reorder_level),
            suggested_quantity,
            supplier,
            supplier_contact,
            estimated_cost,
        })
    }

    async fn product(&self, product_id: i64) -> AppResult<Product> {
        Ok(self.store.get_product(product_id).await?)
    }

    async fn products(&self) -> AppResult<Vec<Product>> {
        Ok(self.store.list_products().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_order_quantity() {
        assert_eq!(suggested_order_quantity(4, 5), 6);
        assert_eq!(suggested_order_quantity(-2, 5), 12);
        assert_eq!(suggested_order_quantity(30, 5), 1);
        assert_eq!(suggested_order_quantity(0, 0), 1);
    }
}
