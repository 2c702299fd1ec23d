//! Return and replacement workflow

use std::sync::Arc;

use serde::Serialize;
use shared::{
    validate_request_id, validate_return_quantity, NewReturn, ReturnAction, ReturnRecord,
    ReturnStatus,
};

use crate::error::{AppError, AppResult};
use crate::external::{StoreError, TransactionStore};

/// Result of posting a return
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReturnPostOutcome {
    /// The return moved to POST and now affects stock
    Posted { record: ReturnRecord },
    /// The key was already used to post this return; nothing changed
    DuplicateIgnored { record: ReturnRecord },
}

/// Return service: PEND -> APPR -> POST, or REJ
#[derive(Clone)]
pub struct ReturnService {
    store: Arc<dyn TransactionStore>,
}

impl ReturnService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self { store }
    }

    /// Open a pending return against a sold line
    pub async fn create(&self, input: NewReturn) -> AppResult<ReturnRecord> {
        if input.quantity <= 0 {
            return Err(AppError::validation(
                "quantity",
                "Return quantity must be positive",
            ));
        }

        let sold_line = self.store.get_sale_line(input.sale_detail_id).await?;

        let already_returned: i64 = self
            .store
            .list_returns()
            .await?
            .iter()
            .filter(|r| {
                r.sale_detail_id == input.sale_detail_id
                    && r.return_status != ReturnStatus::Rejected
            })
            .map(|r| r.quantity)
            .sum();

        validate_return_quantity(input.quantity, sold_line.quantity, already_returned)
            .map_err(|m| AppError::validation("quantity", m))?;

        if let Some(replacement_id) = input.replacement_product_id {
            self.store.get_product(replacement_id).await?;
        }

        let record = self.store.create_return(&input).await?;
        tracing::info!(
            return_id = record.return_id,
            sale_detail_id = record.sale_detail_id,
            quantity = record.quantity,
            "Created return request"
        );
        Ok(record)
    }

    pub async fn get(&self, return_id: i64) -> AppResult<ReturnRecord> {
        Ok(self.store.get_return(return_id).await?)
    }

    pub async fn list(&self) -> AppResult<Vec<ReturnRecord>> {
        Ok(self.store.list_returns().await?)
    }

    /// PEND -> APPR
    pub async fn approve(&self, return_id: i64) -> AppResult<ReturnRecord> {
        let record = self.store.approve_return(return_id).await?;
        self.log_transition(&record, ReturnAction::Approve);
        Ok(record)
    }

    /// APPR -> POST. Posting again with the same key is not an error.
    pub async fn post(&self, return_id: i64, idempotency_key: &str) -> AppResult<ReturnPostOutcome> {
        validate_request_id(idempotency_key)
            .map_err(|m| AppError::validation("idempotency_key", m))?;

        match self.store.post_return(return_id, idempotency_key).await {
            Ok(record) => {
                self.log_transition(&record, ReturnAction::Post);
                Ok(ReturnPostOutcome::Posted { record })
            }
            Err(StoreError::Conflict(message)) => {
                tracing::info!(return_id, "Return already posted: {}", message);
                let record = self.store.get_return(return_id).await?;
                Ok(ReturnPostOutcome::DuplicateIgnored { record })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// PEND or APPR -> REJ
    pub async fn reject(&self, return_id: i64) -> AppResult<ReturnRecord> {
        let record = self.store.reject_return(return_id).await?;
        self.log_transition(&record, ReturnAction::Reject);
        Ok(record)
    }

    fn log_transition(&self, record: &ReturnRecord, action: ReturnAction) {
        tracing::info!(
            return_id = record.return_id,
            %action,
            status = %record.return_status,
            "Return status changed"
        );
    }
}
