//! WebAssembly module for the Bike Shop Inventory Platform
//!
//! Lets the dashboard compute the same numbers as the backend while the
//! user is still editing:
//! - Stock classification and display clamping
//! - Net delta of edited history rows
//! - Period-over-period change

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("bike-shop-inventory-wasm loaded"));
}

/// Classify stock against a reorder level ("Out of Stock", "Low Stock", "In Stock")
#[wasm_bindgen]
pub fn classify_stock_status(stock: i64, reorder_level: i64) -> String {
    classify_stock(stock, reorder_level).to_string()
}

/// Stock figure to show users; negative projections display as zero
#[wasm_bindgen]
pub fn display_stock(projected: i64) -> i64 {
    available_stock(projected)
}

/// Net delta of a scratch buffer of edited rows.
///
/// Expects a JSON array of `{ row_key, original, edited }`.
#[wasm_bindgen]
pub fn edits_net_delta(edits_json: &str) -> Result<i64, JsValue> {
    let edits: Vec<RowEdit> = serde_json::from_str(edits_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid edits JSON: {}", e)))?;

    Ok(EditBuffer::from_edits(edits).net_delta())
}

/// Quantity on hand of a product from a JSON array of movement entries
#[wasm_bindgen]
pub fn project_entries(entries_json: &str, product_id: i64) -> Result<i64, JsValue> {
    let entries: Vec<MovementEntry> = serde_json::from_str(entries_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid entries JSON: {}", e)))?;

    Ok(project_quantity(&entries, product_id))
}

/// Percentage change from the previous period, rounded to 2 places
#[wasm_bindgen]
pub fn period_change_percent(current: f64, previous: f64) -> f64 {
    let current = Decimal::try_from(current).unwrap_or(Decimal::ZERO);
    let previous = Decimal::try_from(previous).unwrap_or(Decimal::ZERO);
    percent_change(current, previous).to_f64().unwrap_or(0.0)
}
