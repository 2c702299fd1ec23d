//! Validation utilities for the Bike Shop Inventory Platform

use crate::models::AdjustmentDetail;

/// Longest accepted idempotency key
pub const MAX_REQUEST_ID_LEN: usize = 64;

/// Largest page size a history query may ask for
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Adjustment Validations
// ============================================================================

/// Validate a client-generated request id / idempotency key
pub fn validate_request_id(id: &str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err("Request id is required");
    }
    if id.len() > MAX_REQUEST_ID_LEN {
        return Err("Request id must be at most 64 characters");
    }
    if id.chars().any(char::is_whitespace) {
        return Err("Request id must not contain whitespace");
    }
    Ok(())
}

/// Validate adjustment lines.
///
/// A zero net delta is not checked here; callers report it separately as
/// "no changes detected".
pub fn validate_adjustment_details(details: &[AdjustmentDetail]) -> Result<(), &'static str> {
    if details.is_empty() {
        return Err("At least one adjustment line is required");
    }
    if details.iter().any(|d| d.product_id <= 0) {
        return Err("Every adjustment line needs a product");
    }
    if details.iter().all(|d| d.quantity == 0) {
        return Err("No changes detected");
    }
    Ok(())
}

// ============================================================================
// Return Validations
// ============================================================================

/// Validate a requested return quantity against what was sold on the line
/// and what is already being returned from it.
pub fn validate_return_quantity(
    requested: i64,
    sold: i64,
    already_returned: i64,
) -> Result<(), &'static str> {
    if requested <= 0 {
        return Err("Return quantity must be positive");
    }
    if requested + already_returned > sold {
        return Err("Return quantity exceeds the quantity sold");
    }
    Ok(())
}

// ============================================================================
// General Validations
// ============================================================================

/// Validate pagination parameters (pages start at 1)
pub fn validate_page(page: u32, per_page: u32) -> Result<(), &'static str> {
    if page == 0 {
        return Err("Page numbers start at 1");
    }
    if per_page == 0 || per_page > MAX_PAGE_SIZE {
        return Err("Page size must be between 1 and 100");
    }
    Ok(())
}
