//! Point-of-sale records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A sale header (one receipt)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub id: i64,
    pub receipt_no: Option<String>,
    pub staff_name: Option<String>,
    pub payment_method: Option<String>,
    pub transaction_date: DateTime<Utc>,
}

/// One sold product line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl SaleLine {
    /// Line revenue (quantity x unit price)
    pub fn total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}
