//! Movement history of a product

use std::sync::Arc;

use shared::{sort_newest_first, validate_page, MovementEntry, PaginatedResponse, Pagination};

use crate::error::{AppError, AppResult};
use crate::external::TransactionStore;
use crate::services::LedgerReader;

/// History service: one merged, newest-first view over every stream
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn TransactionStore>,
    ledger: LedgerReader,
}

impl HistoryService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            ledger: LedgerReader::new(store.clone()),
            store,
        }
    }

    /// One page of a product's movements, newest first.
    ///
    /// Entries with the same timestamp keep stream order, so the same query
    /// always returns the same page.
    pub async fn history(
        &self,
        product_id: i64,
        page: u32,
        per_page: u32,
    ) -> AppResult<PaginatedResponse<MovementEntry>> {
        validate_page(page, per_page).map_err(|m| AppError::validation("page", m))?;
        self.store.get_product(product_id).await?;

        let mut entries = self.ledger.product_entries(product_id).await?;
        sort_newest_first(&mut entries);

        Ok(PaginatedResponse::from_slice(
            &entries,
            Pagination::new(page, per_page),
        ))
    }
}
