//! Idempotent adjustment posting

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use shared::{
    validate_adjustment_details, validate_request_id, AdjustmentIntent, AdjustmentRequest,
    AdjustmentType, EditBuffer, MovementEntry, PostOutcome, RowEdit,
};

use crate::error::{AppError, AppResult};
use crate::external::{StoreError, TransactionStore};
use crate::services::LedgerReader;

/// Default remark on adjustments created from history edits
pub const HISTORY_EDIT_REMARKS: &str = "Correction from stock history edit";

/// Adjustment service: posts each adjustment intent at most once
#[derive(Clone)]
pub struct AdjustmentService {
    store: Arc<dyn TransactionStore>,
    ledger: LedgerReader,
}

impl AdjustmentService {
    pub fn new(store: Arc<dyn TransactionStore>) -> Self {
        Self {
            ledger: LedgerReader::new(store.clone()),
            store,
        }
    }

    /// Post one adjustment request.
    ///
    /// Every product on the request must exist. A request id the store has
    /// already seen is reported as `DuplicateIgnored`, not as an error.
    pub async fn post(&self, request: &AdjustmentRequest) -> AppResult<PostOutcome> {
        validate_request_id(&request.client_request_id)
            .map_err(|m| AppError::validation("client_request_id", m))?;

        match validate_adjustment_details(&request.details) {
            Ok(()) => {}
            Err("No changes detected") => return Err(AppError::NoChanges),
            Err(m) => return Err(AppError::validation("details", m)),
        }

        let net_delta = request.net_delta();
        if net_delta == 0 {
            return Err(AppError::NoChanges);
        }

        let product_ids: BTreeSet<i64> = request.details.iter().map(|d| d.product_id).collect();
        for product_id in product_ids {
            self.store.get_product(product_id).await?;
        }

        match self.store.create_adjustment(request).await {
            Ok(adjustment) => {
                tracing::info!(
                    adjustment_id = adjustment.id,
                    client_request_id = %request.client_request_id,
                    net_delta,
                    "Posted stock adjustment"
                );
                Ok(PostOutcome::Posted {
                    adjustment,
                    net_delta,
                })
            }
            Err(StoreError::Conflict(message)) => {
                tracing::info!(
                    client_request_id = %request.client_request_id,
                    "Adjustment already applied: {}",
                    message
                );
                Ok(PostOutcome::DuplicateIgnored {
                    client_request_id: request.client_request_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Adjust one product's stock by a net delta.
    ///
    /// A missing `client_request_id` starts a new intent with a fresh id;
    /// a retry of the same user action must pass the id it got back.
    pub async fn submit_adjustment(
        &self,
        product_id: i64,
        net_delta: i64,
        adjustment_type: AdjustmentType,
        remarks: String,
        client_request_id: Option<String>,
    ) -> AppResult<PostOutcome> {
        let intent = match client_request_id {
            Some(id) => AdjustmentIntent::with_request_id(
                id,
                adjustment_type,
                remarks,
                vec![shared::AdjustmentDetail {
                    product_id,
                    quantity: net_delta,
                }],
            ),
            None => AdjustmentIntent::for_product(product_id, net_delta, adjustment_type, remarks),
        };

        self.post(intent.request()).await
    }

    /// Turn edited history rows into one compensating adjustment.
    ///
    /// Every edit must name a row in the product's history and carry the
    /// quantity that row currently has.
    pub async fn submit_edits(
        &self,
        product_id: i64,
        edits: Vec<RowEdit>,
        remarks: Option<String>,
        client_request_id: Option<String>,
    ) -> AppResult<PostOutcome> {
        self.store.get_product(product_id).await?;

        let entries = self.ledger.product_entries(product_id).await?;
        let buffer = stage_edits(&entries, edits)?;

        let net_delta = buffer.net_delta();
        if !buffer.is_dirty() || net_delta == 0 {
            return Err(AppError::NoChanges);
        }

        tracing::debug!(
            product_id,
            rows = buffer.edits().count(),
            net_delta,
            "Submitting history edits"
        );

        self.submit_adjustment(
            product_id,
            net_delta,
            AdjustmentType::Correction,
            remarks.unwrap_or_else(|| HISTORY_EDIT_REMARKS.to_string()),
            client_request_id,
        )
        .await
    }
}

/// Check submitted edits against the current history and stage them
pub fn stage_edits(entries: &[MovementEntry], edits: Vec<RowEdit>) -> AppResult<EditBuffer> {
    let rows: HashMap<String, &MovementEntry> =
        entries.iter().map(|e| (e.row_key(), e)).collect();

    let mut buffer = EditBuffer::new();
    for edit in edits {
        let Some(entry) = rows.get(&edit.row_key) else {
            return Err(AppError::validation(
                "edits",
                format!("Unknown history row {}", edit.row_key),
            ));
        };
        if entry.quantity != edit.original {
            return Err(AppError::validation(
                "edits",
                format!(
                    "History row {} changed since it was loaded (now {})",
                    edit.row_key, entry.quantity
                ),
            ));
        }
        buffer.stage_entry(entry, edit.edited);
    }

    Ok(buffer)
}
