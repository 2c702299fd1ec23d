//! Stockout (shrinkage, damage, internal use) records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stockout header.
///
/// Older stockouts carry the product and quantity on the header itself and
/// have no lines; newer ones carry one line per product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stockout {
    pub id: i64,
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
    pub reason: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockoutLine {
    pub id: i64,
    pub stockout_id: i64,
    pub product_id: Option<i64>,
    pub quantity: i64,
}
