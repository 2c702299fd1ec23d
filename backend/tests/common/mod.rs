//! Fixtures shared by the backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use bsi_backend::external::{MemoryStore, TransactionStore};
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use rust_decimal::Decimal;
use shared::{Product, Sale, SaleLine, Stockout, StockoutLine, Supply, SupplyLine};

/// Shop local time (UTC+8)
pub fn shop_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

/// Shop-local wall clock time as UTC
pub fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    shop_offset()
        .with_ymd_and_hms(y, m, d, h, 0, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn product(id: i64, name: &str, reorder_level: i64) -> Product {
    Product {
        id,
        name: name.to_string(),
        category: None,
        reorder_level,
        price: Decimal::new(100, 0),
    }
}

pub fn product_in(id: i64, name: &str, category: &str) -> Product {
    Product {
        category: Some(category.to_string()),
        ..product(id, name, 0)
    }
}

/// Test harness around a memory store
pub struct Shop {
    pub store: Arc<MemoryStore>,
    next_id: std::sync::atomic::AtomicI64,
}

impl Shop {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            next_id: std::sync::atomic::AtomicI64::new(1),
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn TransactionStore> {
        self.store.clone()
    }

    fn id(&self) -> i64 {
        self.next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }

    pub async fn with_product(self, product: Product) -> Self {
        self.store.insert_product(product).await;
        self
    }

    /// Receive `quantity` units of a product; returns the supply id
    pub async fn supply(
        &self,
        product_id: i64,
        quantity: i64,
        at: DateTime<Utc>,
        supplier: &str,
    ) -> i64 {
        let supply_id = self.id();
        self.store
            .insert_supply(
                Supply {
                    id: supply_id,
                    supplier_id: Some(supply_id * 10),
                    supplier_name: Some(supplier.to_string()),
                    supplier_contact: Some(format!("{}@example.com", supplier.to_lowercase())),
                    transaction_date: at,
                    remarks: None,
                },
                vec![SupplyLine {
                    id: self.id(),
                    supply_id,
                    product_id: Some(product_id),
                    quantity,
                    unit_cost: Some(Decimal::new(50, 0)),
                    created_at: at,
                }],
            )
            .await;
        supply_id
    }

    /// Sell `quantity` units at `unit_price`; returns the sale line id
    pub async fn sell(
        &self,
        product_id: i64,
        quantity: i64,
        unit_price: Decimal,
        at: DateTime<Utc>,
    ) -> i64 {
        self.sell_by(product_id, quantity, unit_price, at, None, None)
            .await
    }

    pub async fn sell_by(
        &self,
        product_id: i64,
        quantity: i64,
        unit_price: Decimal,
        at: DateTime<Utc>,
        staff: Option<&str>,
        payment_method: Option<&str>,
    ) -> i64 {
        let sale_id = self.id();
        let line_id = self.id();
        self.store
            .insert_sale(
                Sale {
                    id: sale_id,
                    receipt_no: Some(format!("R-{}", sale_id)),
                    staff_name: staff.map(str::to_string),
                    payment_method: payment_method.map(str::to_string),
                    transaction_date: at,
                },
                vec![SaleLine {
                    id: line_id,
                    sale_id,
                    product_id: Some(product_id),
                    quantity,
                    unit_price,
                    created_at: at,
                }],
            )
            .await;
        line_id
    }

    /// Header-only stockout
    pub async fn stockout(&self, product_id: i64, quantity: i64, at: DateTime<Utc>) {
        self.store
            .insert_stockout(
                Stockout {
                    id: self.id(),
                    product_id: Some(product_id),
                    quantity: Some(quantity),
                    reason: Some("damaged".to_string()),
                    transaction_date: at,
                    remarks: None,
                },
                Vec::new(),
            )
            .await;
    }

    /// Line-based stockout
    pub async fn stockout_lines(&self, lines: &[(i64, i64)], at: DateTime<Utc>) {
        let stockout_id = self.id();
        let lines = lines
            .iter()
            .map(|(product_id, quantity)| StockoutLine {
                id: self.id(),
                stockout_id,
                product_id: Some(*product_id),
                quantity: *quantity,
            })
            .collect();
        self.store
            .insert_stockout(
                Stockout {
                    id: stockout_id,
                    product_id: None,
                    quantity: None,
                    reason: Some("internal use".to_string()),
                    transaction_date: at,
                    remarks: None,
                },
                lines,
            )
            .await;
    }
}
