//! Product references and stock classification

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product as seen by the inventory engine.
///
/// Products are owned by product management; the engine only reads the
/// reorder level and price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub reorder_level: i64,
    pub price: Decimal,
}

/// Stock state of a product relative to its reorder level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    /// Whether the product should show up on reorder lists
    pub fn needs_reorder(&self) -> bool {
        !matches!(self, StockStatus::InStock)
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockStatus::OutOfStock => write!(f, "Out of Stock"),
            StockStatus::LowStock => write!(f, "Low Stock"),
            StockStatus::InStock => write!(f, "In Stock"),
        }
    }
}

/// Classify a stock quantity against a reorder level.
///
/// `stock <= 0` is always out of stock. Low stock triggers at or below the
/// reorder level, so `stock == reorder_level` is low.
pub fn classify_stock(stock: i64, reorder_level: i64) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock <= reorder_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// Stock figure shown to users: a negative projection displays as zero.
pub fn available_stock(projected: i64) -> i64 {
    projected.max(0)
}

/// One row of the low-stock alert list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LowStockAlert {
    pub product_id: i64,
    pub product_name: String,
    pub stock: i64,
    pub reorder_level: i64,
    pub status: StockStatus,
}

/// Build the bounded low-stock list from projected stock per product.
///
/// Products at or below their reorder level are sorted ascending by stock
/// (ties by product id) and truncated to `limit`.
pub fn low_stock_alerts<F>(products: &[Product], stock_of: F, limit: usize) -> Vec<LowStockAlert>
where
    F: Fn(i64) -> i64,
{
    let mut alerts: Vec<LowStockAlert> = products
        .iter()
        .filter_map(|p| {
            let stock = stock_of(p.id);
            let status = classify_stock(stock, p.reorder_level);
            status.needs_reorder().then(|| LowStockAlert {
                product_id: p.id,
                product_name: p.name.clone(),
                stock,
                reorder_level: p.reorder_level,
                status,
            })
        })
        .collect();

    alerts.sort_by(|a, b| a.stock.cmp(&b.stock).then(a.product_id.cmp(&b.product_id)));
    alerts.truncate(limit);
    alerts
}
