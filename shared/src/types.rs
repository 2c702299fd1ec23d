//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Pagination parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self { page, per_page }
    }

    /// Zero-based offset of the first item on this page
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.per_page as usize
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T: Clone> PaginatedResponse<T> {
    /// Slice an already ordered list into one page.
    ///
    /// Pages past the end are empty rather than an error so that a client
    /// holding a stale page number still gets a well-formed response.
    pub fn from_slice(items: &[T], pagination: Pagination) -> Self {
        let per_page = pagination.per_page.max(1);
        let total_items = items.len() as u64;
        let total_pages = ((total_items + per_page as u64 - 1) / per_page as u64) as u32;

        let start = pagination.offset().min(items.len());
        let end = (start + per_page as usize).min(items.len());

        Self {
            data: items[start..end].to_vec(),
            pagination: PaginationMeta {
                page: pagination.page,
                per_page,
                total_items,
                total_pages,
            },
        }
    }
}

/// Date range for queries (both ends inclusive, shop-local calendar dates)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
}

impl DateRange {
    pub fn new(start: chrono::NaiveDate, end: chrono::NaiveDate) -> Self {
        Self { start, end }
    }

    /// Number of calendar days covered by the range
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}
