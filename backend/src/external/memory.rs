//! In-process transaction store
//!
//! Keeps raw rows in memory behind a `tokio::sync::RwLock`. Used for local
//! development and by the test suite; it enforces the same idempotency and
//! return-state rules as the real stores.

use std::collections::HashMap;

use async_trait::async_trait;
use shared::{
    validate_return_quantity, Adjustment, AdjustmentLine, AdjustmentRequest, NewReturn, Product,
    ReportWindow, ReturnAction, ReturnRecord, ReturnStatus, Sale, SaleLine, Stockout, StockoutLine,
    Supply, SupplyLine,
};
use tokio::sync::RwLock;

use super::{AdjustmentFilter, StoreError, StoreResult, TransactionStore};

#[derive(Debug, Default)]
struct MemoryState {
    products: Vec<Product>,
    quantity_on_hand: HashMap<i64, i64>,
    supplies: Vec<Supply>,
    supply_lines: Vec<SupplyLine>,
    stockouts: Vec<Stockout>,
    stockout_lines: Vec<StockoutLine>,
    sales: Vec<Sale>,
    sale_lines: Vec<SaleLine>,
    adjustments: Vec<Adjustment>,
    returns: Vec<ReturnRecord>,
}

impl MemoryState {
    fn next_adjustment_id(&self) -> i64 {
        self.adjustments.iter().map(|a| a.id).max().unwrap_or(0) + 1
    }

    fn next_adjustment_line_id(&self) -> i64 {
        self.adjustments
            .iter()
            .flat_map(|a| a.lines.iter().map(|l| l.id))
            .max()
            .unwrap_or(0)
            + 1
    }

    fn next_return_id(&self) -> i64 {
        self.returns.iter().map(|r| r.return_id).max().unwrap_or(0) + 1
    }

    fn return_mut(&mut self, return_id: i64) -> StoreResult<&mut ReturnRecord> {
        self.returns
            .iter_mut()
            .find(|r| r.return_id == return_id)
            .ok_or_else(|| StoreError::NotFound(format!("Return {} not found", return_id)))
    }
}

/// In-memory [`TransactionStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.write().await.products.push(product);
    }

    /// Set the store's own precomputed stock figure for a product
    pub async fn set_quantity_on_hand(&self, product_id: i64, quantity: i64) {
        self.state
            .write()
            .await
            .quantity_on_hand
            .insert(product_id, quantity);
    }

    pub async fn insert_supply(&self, supply: Supply, lines: Vec<SupplyLine>) {
        let mut state = self.state.write().await;
        state.supplies.push(supply);
        state.supply_lines.extend(lines);
    }

    pub async fn insert_sale(&self, sale: Sale, lines: Vec<SaleLine>) {
        let mut state = self.state.write().await;
        state.sales.push(sale);
        state.sale_lines.extend(lines);
    }

    pub async fn insert_stockout(&self, stockout: Stockout, lines: Vec<StockoutLine>) {
        let mut state = self.state.write().await;
        state.stockouts.push(stockout);
        state.stockout_lines.extend(lines);
    }

    pub async fn insert_adjustment(&self, adjustment: Adjustment) {
        self.state.write().await.adjustments.push(adjustment);
    }

    pub async fn insert_return(&self, record: ReturnRecord) {
        self.state.write().await.returns.push(record);
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn list_supplies(&self) -> StoreResult<Vec<Supply>> {
        Ok(self.state.read().await.supplies.clone())
    }

    async fn list_supply_lines(&self, supply_id: i64) -> StoreResult<Vec<SupplyLine>> {
        let state = self.state.read().await;
        Ok(state
            .supply_lines
            .iter()
            .filter(|l| l.supply_id == supply_id)
            .cloned()
            .collect())
    }

    async fn get_supply(&self, supply_id: i64) -> StoreResult<Supply> {
        let state = self.state.read().await;
        state
            .supplies
            .iter()
            .find(|s| s.id == supply_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Supply {} not found", supply_id)))
    }

    async fn list_stockouts(&self) -> StoreResult<Vec<Stockout>> {
        Ok(self.state.read().await.stockouts.clone())
    }

    async fn list_stockout_lines(&self, stockout_id: i64) -> StoreResult<Vec<StockoutLine>> {
        let state = self.state.read().await;
        Ok(state
            .stockout_lines
            .iter()
            .filter(|l| l.stockout_id == stockout_id)
            .cloned()
            .collect())
    }

    async fn list_sales(&self, window: Option<&ReportWindow>) -> StoreResult<Vec<Sale>> {
        let state = self.state.read().await;
        Ok(state
            .sales
            .iter()
            .filter(|s| window.map(|w| w.contains(s.transaction_date)).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn list_sale_lines(&self, sale_id: i64) -> StoreResult<Vec<SaleLine>> {
        let state = self.state.read().await;
        Ok(state
            .sale_lines
            .iter()
            .filter(|l| l.sale_id == sale_id)
            .cloned()
            .collect())
    }

    async fn get_sale_line(&self, sale_detail_id: i64) -> StoreResult<SaleLine> {
        let state = self.state.read().await;
        state
            .sale_lines
            .iter()
            .find(|l| l.id == sale_detail_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Sale line {} not found", sale_detail_id)))
    }

    async fn list_adjustments(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<Adjustment>> {
        let state = self.state.read().await;
        let matching = state.adjustments.iter().filter(|a| match filter.product_id {
            Some(product_id) => a.lines.iter().any(|l| l.product_id == Some(product_id)),
            None => true,
        });

        let adjustments = match (filter.page, filter.page_size) {
            (Some(page), Some(size)) => matching
                .skip((page.saturating_sub(1) * size) as usize)
                .take(size as usize)
                .cloned()
                .collect(),
            _ => matching.cloned().collect(),
        };
        Ok(adjustments)
    }

    async fn create_adjustment(&self, request: &AdjustmentRequest) -> StoreResult<Adjustment> {
        let mut state = self.state.write().await;

        if state
            .adjustments
            .iter()
            .any(|a| a.client_request_id == request.client_request_id)
        {
            return Err(StoreError::Conflict(format!(
                "Adjustment request {} was already applied",
                request.client_request_id
            )));
        }

        let id = state.next_adjustment_id();
        let first_line_id = state.next_adjustment_line_id();
        let adjustment = Adjustment {
            id,
            client_request_id: request.client_request_id.clone(),
            adjustment_type: request.adjustment_type,
            transaction_date: request.transaction_date,
            remarks: Some(request.remarks.clone()).filter(|r| !r.is_empty()),
            lines: request
                .details
                .iter()
                .enumerate()
                .map(|(i, d)| AdjustmentLine {
                    id: first_line_id + i as i64,
                    adjustment_id: id,
                    product_id: Some(d.product_id),
                    quantity: d.quantity,
                })
                .collect(),
        };

        state.adjustments.push(adjustment.clone());
        Ok(adjustment)
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        Ok(self.state.read().await.products.clone())
    }

    async fn get_product(&self, product_id: i64) -> StoreResult<Product> {
        let state = self.state.read().await;
        state
            .products
            .iter()
            .find(|p| p.id == product_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn get_quantity_on_hand(&self, product_id: i64) -> StoreResult<Option<i64>> {
        Ok(self
            .state
            .read()
            .await
            .quantity_on_hand
            .get(&product_id)
            .copied())
    }

    async fn list_returns(&self) -> StoreResult<Vec<ReturnRecord>> {
        Ok(self.state.read().await.returns.clone())
    }

    async fn get_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        let state = self.state.read().await;
        state
            .returns
            .iter()
            .find(|r| r.return_id == return_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Return {} not found", return_id)))
    }

    async fn create_return(&self, input: &NewReturn) -> StoreResult<ReturnRecord> {
        let mut state = self.state.write().await;

        let sold = state
            .sale_lines
            .iter()
            .find(|l| l.id == input.sale_detail_id)
            .map(|l| l.quantity)
            .ok_or_else(|| {
                StoreError::NotFound(format!("Sale line {} not found", input.sale_detail_id))
            })?;

        let already_returned: i64 = state
            .returns
            .iter()
            .filter(|r| {
                r.sale_detail_id == input.sale_detail_id
                    && r.return_status != ReturnStatus::Rejected
            })
            .map(|r| r.quantity)
            .sum();

        validate_return_quantity(input.quantity, sold, already_returned)
            .map_err(|m| StoreError::Rejected(m.to_string()))?;

        let record = ReturnRecord {
            return_id: state.next_return_id(),
            sale_detail_id: input.sale_detail_id,
            quantity: input.quantity,
            replacement_product_id: input.replacement_product_id,
            return_status: ReturnStatus::Pending,
            transaction_date: input.transaction_date,
            remarks: input.remarks.clone(),
            posting_key: None,
        };

        state.returns.push(record.clone());
        Ok(record)
    }

    async fn approve_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        let mut state = self.state.write().await;
        let record = state.return_mut(return_id)?;
        record.return_status = record
            .return_status
            .apply(ReturnAction::Approve)
            .map_err(|e| StoreError::InvalidState(e.to_string()))?;
        Ok(record.clone())
    }

    async fn post_return(&self, return_id: i64, idempotency_key: &str) -> StoreResult<ReturnRecord> {
        let mut state = self.state.write().await;

        if state
            .returns
            .iter()
            .any(|r| r.return_id != return_id && r.posting_key.as_deref() == Some(idempotency_key))
        {
            return Err(StoreError::Rejected(format!(
                "Idempotency key {} is already used by another return",
                idempotency_key
            )));
        }

        let record = state.return_mut(return_id)?;
        if record.posting_key.as_deref() == Some(idempotency_key) {
            return Err(StoreError::Conflict(format!(
                "Return {} was already posted with this key",
                return_id
            )));
        }

        record.return_status = record
            .return_status
            .apply(ReturnAction::Post)
            .map_err(|e| StoreError::InvalidState(e.to_string()))?;
        record.posting_key = Some(idempotency_key.to_string());
        Ok(record.clone())
    }

    async fn reject_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        let mut state = self.state.write().await;
        let record = state.return_mut(return_id)?;
        record.return_status = record
            .return_status
            .apply(ReturnAction::Reject)
            .map_err(|e| StoreError::InvalidState(e.to_string()))?;
        Ok(record.clone())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
