//! PostgreSQL transaction store
//!
//! Raw transaction rows live in plain tables (see `migrations/`). Idempotency
//! keys are unique columns; duplicate inserts are detected with
//! `ON CONFLICT DO NOTHING` rather than by catching constraint errors.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared::{
    Adjustment, AdjustmentLine, AdjustmentRequest, AdjustmentType, NewReturn, Product, ReportWindow,
    validate_return_quantity, ReturnAction, ReturnRecord, ReturnStatus, Sale, SaleLine, Stockout,
    StockoutLine, Supply, SupplyLine,
};
use sqlx::{FromRow, PgPool};

use super::{AdjustmentFilter, StoreError, StoreResult, TransactionStore};

/// PostgreSQL-backed [`TransactionStore`]
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }

    async fn adjustment_lines(&self, adjustment_ids: &[i64]) -> StoreResult<Vec<AdjustmentLineRow>> {
        let lines = sqlx::query_as::<_, AdjustmentLineRow>(
            r#"
            SELECT id, adjustment_id, product_id, quantity
            FROM adjustment_lines
            WHERE adjustment_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(adjustment_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(lines)
    }

    /// Guarded status update; `None` when the row was not in `from`
    async fn transition_return(
        &self,
        return_id: i64,
        from: &[ReturnStatus],
        to: ReturnStatus,
        posting_key: Option<&str>,
    ) -> StoreResult<Option<ReturnRecord>> {
        let from: Vec<&str> = from.iter().map(|s| s.code()).collect();

        let row = sqlx::query_as::<_, ReturnRow>(
            r#"
            UPDATE returns
            SET return_status = $2,
                posting_key = COALESCE($3, posting_key),
                updated_at = NOW()
            WHERE return_id = $1 AND return_status = ANY($4)
            RETURNING return_id, sale_detail_id, quantity, replacement_product_id,
                      return_status, transaction_date, remarks, posting_key
            "#,
        )
        .bind(return_id)
        .bind(to.code())
        .bind(posting_key)
        .bind(from)
        .fetch_optional(&self.db)
        .await?;

        row.map(ReturnRecord::try_from).transpose()
    }

    /// Return that posted with this key, if any
    async fn posting_key_owner(&self, idempotency_key: &str) -> StoreResult<Option<i64>> {
        let owner = sqlx::query_scalar::<_, i64>(
            "SELECT return_id FROM returns WHERE posting_key = $1",
        )
        .bind(idempotency_key)
        .fetch_optional(&self.db)
        .await?;
        Ok(owner)
    }

    /// Explain why a guarded update matched nothing
    async fn refused_transition(&self, return_id: i64, action: ReturnAction) -> StoreError {
        match self.get_return(return_id).await {
            Ok(record) => match record.return_status.apply(action) {
                Err(e) => StoreError::InvalidState(e.to_string()),
                Ok(_) => StoreError::InvalidState(format!(
                    "Return {} changed while being updated",
                    return_id
                )),
            },
            Err(e) => e,
        }
    }

    async fn apply_action(&self, return_id: i64, action: ReturnAction) -> StoreResult<ReturnRecord> {
        let (from, to): (&[ReturnStatus], ReturnStatus) = match action {
            ReturnAction::Approve => (&[ReturnStatus::Pending], ReturnStatus::Approved),
            ReturnAction::Reject => (
                &[ReturnStatus::Pending, ReturnStatus::Approved],
                ReturnStatus::Rejected,
            ),
            ReturnAction::Post => (&[ReturnStatus::Approved], ReturnStatus::Posted),
        };

        match self.transition_return(return_id, from, to, None).await? {
            Some(record) => Ok(record),
            None => Err(self.refused_transition(return_id, action).await),
        }
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    category: Option<String>,
    reorder_level: i64,
    price: Decimal,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            category: row.category,
            reorder_level: row.reorder_level,
            price: row.price,
        }
    }
}

#[derive(Debug, FromRow)]
struct SupplyRow {
    id: i64,
    supplier_id: Option<i64>,
    supplier_name: Option<String>,
    supplier_contact: Option<String>,
    transaction_date: DateTime<Utc>,
    remarks: Option<String>,
}

impl From<SupplyRow> for Supply {
    fn from(row: SupplyRow) -> Self {
        Supply {
            id: row.id,
            supplier_id: row.supplier_id,
            supplier_name: row.supplier_name,
            supplier_contact: row.supplier_contact,
            transaction_date: row.transaction_date,
            remarks: row.remarks,
        }
    }
}

#[derive(Debug, FromRow)]
struct SupplyLineRow {
    id: i64,
    supply_id: i64,
    product_id: Option<i64>,
    quantity: i64,
    unit_cost: Option<Decimal>,
    created_at: DateTime<Utc>,
}

impl From<SupplyLineRow> for SupplyLine {
    fn from(row: SupplyLineRow) -> Self {
        SupplyLine {
            id: row.id,
            supply_id: row.supply_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_cost: row.unit_cost,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    id: i64,
    receipt_no: Option<String>,
    staff_name: Option<String>,
    payment_method: Option<String>,
    transaction_date: DateTime<Utc>,
}

impl From<SaleRow> for Sale {
    fn from(row: SaleRow) -> Self {
        Sale {
            id: row.id,
            receipt_no: row.receipt_no,
            staff_name: row.staff_name,
            payment_method: row.payment_method,
            transaction_date: row.transaction_date,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    id: i64,
    sale_id: i64,
    product_id: Option<i64>,
    quantity: i64,
    unit_price: Decimal,
    created_at: DateTime<Utc>,
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        SaleLine {
            id: row.id,
            sale_id: row.sale_id,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockoutRow {
    id: i64,
    product_id: Option<i64>,
    quantity: Option<i64>,
    reason: Option<String>,
    transaction_date: DateTime<Utc>,
    remarks: Option<String>,
}

impl From<StockoutRow> for Stockout {
    fn from(row: StockoutRow) -> Self {
        Stockout {
            id: row.id,
            product_id: row.product_id,
            quantity: row.quantity,
            reason: row.reason,
            transaction_date: row.transaction_date,
            remarks: row.remarks,
        }
    }
}

#[derive(Debug, FromRow)]
struct StockoutLineRow {
    id: i64,
    stockout_id: i64,
    product_id: Option<i64>,
    quantity: i64,
}

impl From<StockoutLineRow> for StockoutLine {
    fn from(row: StockoutLineRow) -> Self {
        StockoutLine {
            id: row.id,
            stockout_id: row.stockout_id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

#[derive(Debug, FromRow)]
struct AdjustmentRow {
    id: i64,
    client_request_id: String,
    adjustment_type: String,
    transaction_date: DateTime<Utc>,
    remarks: Option<String>,
}

#[derive(Debug, FromRow)]
struct AdjustmentLineRow {
    id: i64,
    adjustment_id: i64,
    product_id: Option<i64>,
    quantity: i64,
}

impl From<AdjustmentLineRow> for AdjustmentLine {
    fn from(row: AdjustmentLineRow) -> Self {
        AdjustmentLine {
            id: row.id,
            adjustment_id: row.adjustment_id,
            product_id: row.product_id,
            quantity: row.quantity,
        }
    }
}

impl AdjustmentRow {
    fn into_adjustment(self, lines: Vec<AdjustmentLine>) -> StoreResult<Adjustment> {
        let adjustment_type = self
            .adjustment_type
            .parse::<AdjustmentType>()
            .map_err(StoreError::Upstream)?;

        Ok(Adjustment {
            id: self.id,
            client_request_id: self.client_request_id,
            adjustment_type,
            transaction_date: self.transaction_date,
            remarks: self.remarks,
            lines,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReturnRow {
    return_id: i64,
    sale_detail_id: i64,
    quantity: i64,
    replacement_product_id: Option<i64>,
    return_status: String,
    transaction_date: DateTime<Utc>,
    remarks: Option<String>,
    posting_key: Option<String>,
}

impl TryFrom<ReturnRow> for ReturnRecord {
    type Error = StoreError;

    fn try_from(row: ReturnRow) -> Result<Self, Self::Error> {
        let return_status = row
            .return_status
            .parse::<ReturnStatus>()
            .map_err(StoreError::Upstream)?;

        Ok(ReturnRecord {
            return_id: row.return_id,
            sale_detail_id: row.sale_detail_id,
            quantity: row.quantity,
            replacement_product_id: row.replacement_product_id,
            return_status,
            transaction_date: row.transaction_date,
            remarks: row.remarks,
            posting_key: row.posting_key,
        })
    }
}

const RETURN_COLUMNS: &str = "return_id, sale_detail_id, quantity, replacement_product_id, \
     return_status, transaction_date, remarks, posting_key";

#[async_trait]
impl TransactionStore for PgStore {
    async fn list_supplies(&self) -> StoreResult<Vec<Supply>> {
        let rows = sqlx::query_as::<_, SupplyRow>(
            r#"
            SELECT id, supplier_id, supplier_name, supplier_contact, transaction_date, remarks
            FROM supplies
            ORDER BY transaction_date, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Supply::from).collect())
    }

    async fn list_supply_lines(&self, supply_id: i64) -> StoreResult<Vec<SupplyLine>> {
        let rows = sqlx::query_as::<_, SupplyLineRow>(
            r#"
            SELECT id, supply_id, product_id, quantity, unit_cost, created_at
            FROM supply_lines
            WHERE supply_id = $1
            ORDER BY id
            "#,
        )
        .bind(supply_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(SupplyLine::from).collect())
    }

    async fn get_supply(&self, supply_id: i64) -> StoreResult<Supply> {
        sqlx::query_as::<_, SupplyRow>(
            r#"
            SELECT id, supplier_id, supplier_name, supplier_contact, transaction_date, remarks
            FROM supplies
            WHERE id = $1
            "#,
        )
        .bind(supply_id)
        .fetch_optional(&self.db)
        .await?
        .map(Supply::from)
        .ok_or_else(|| StoreError::NotFound(format!("Supply {} not found", supply_id)))
    }

    async fn list_stockouts(&self) -> StoreResult<Vec<Stockout>> {
        let rows = sqlx::query_as::<_, StockoutRow>(
            r#"
            SELECT id, product_id, quantity, reason, transaction_date, remarks
            FROM stockouts
            ORDER BY transaction_date, id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Stockout::from).collect())
    }

    async fn list_stockout_lines(&self, stockout_id: i64) -> StoreResult<Vec<StockoutLine>> {
        let rows = sqlx::query_as::<_, StockoutLineRow>(
            r#"
            SELECT id, stockout_id, product_id, quantity
            FROM stockout_lines
            WHERE stockout_id = $1
            ORDER BY id
            "#,
        )
        .bind(stockout_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(StockoutLine::from).collect())
    }

    async fn list_sales(&self, window: Option<&ReportWindow>) -> StoreResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, receipt_no, staff_name, payment_method, transaction_date
            FROM sales
            WHERE ($1::timestamptz IS NULL OR transaction_date >= $1)
              AND ($2::timestamptz IS NULL OR transaction_date < $2)
            ORDER BY transaction_date, id
            "#,
        )
        .bind(window.map(|w| w.start))
        .bind(window.map(|w| w.end))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Sale::from).collect())
    }

    async fn list_sale_lines(&self, sale_id: i64) -> StoreResult<Vec<SaleLine>> {
        let rows = sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price, created_at
            FROM sale_lines
            WHERE sale_id = $1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(SaleLine::from).collect())
    }

    async fn get_sale_line(&self, sale_detail_id: i64) -> StoreResult<SaleLine> {
        sqlx::query_as::<_, SaleLineRow>(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price, created_at
            FROM sale_lines
            WHERE id = $1
            "#,
        )
        .bind(sale_detail_id)
        .fetch_optional(&self.db)
        .await?
        .map(SaleLine::from)
        .ok_or_else(|| StoreError::NotFound(format!("Sale line {} not found", sale_detail_id)))
    }

    async fn list_adjustments(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<Adjustment>> {
        let limit = filter.page_size.map(i64::from);
        let offset = match (filter.page, filter.page_size) {
            (Some(page), Some(size)) => i64::from(page.saturating_sub(1)) * i64::from(size),
            _ => 0,
        };

        let headers = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            SELECT a.id, a.client_request_id, a.adjustment_type, a.transaction_date, a.remarks
            FROM adjustments a
            WHERE $1::bigint IS NULL
               OR EXISTS (
                    SELECT 1 FROM adjustment_lines l
                    WHERE l.adjustment_id = a.id AND l.product_id = $1
               )
            ORDER BY a.id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        let mut lines_by_adjustment: HashMap<i64, Vec<AdjustmentLine>> = HashMap::new();
        for line in self.adjustment_lines(&ids).await? {
            lines_by_adjustment
                .entry(line.adjustment_id)
                .or_default()
                .push(AdjustmentLine::from(line));
        }

        headers
            .into_iter()
            .map(|header| {
                let lines = lines_by_adjustment.remove(&header.id).unwrap_or_default();
                header.into_adjustment(lines)
            })
            .collect()
    }

    async fn create_adjustment(&self, request: &AdjustmentRequest) -> StoreResult<Adjustment> {
        let mut tx = self.db.begin().await?;

        let header = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            INSERT INTO adjustments (client_request_id, adjustment_type, transaction_date, remarks)
            VALUES ($1, $2, $3, NULLIF($4, ''))
            ON CONFLICT (client_request_id) DO NOTHING
            RETURNING id, client_request_id, adjustment_type, transaction_date, remarks
            "#,
        )
        .bind(&request.client_request_id)
        .bind(request.adjustment_type.as_str())
        .bind(request.transaction_date)
        .bind(&request.remarks)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(header) = header else {
            return Err(StoreError::Conflict(format!(
                "Adjustment request {} was already applied",
                request.client_request_id
            )));
        };

        let mut lines = Vec::with_capacity(request.details.len());
        for detail in &request.details {
            let line = sqlx::query_as::<_, AdjustmentLineRow>(
                r#"
                INSERT INTO adjustment_lines (adjustment_id, product_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id, adjustment_id, product_id, quantity
                "#,
            )
            .bind(header.id)
            .bind(detail.product_id)
            .bind(detail.quantity)
            .fetch_one(&mut *tx)
            .await?;
            lines.push(AdjustmentLine::from(line));
        }

        tx.commit().await?;

        header.into_adjustment(lines)
    }

    async fn list_products(&self) -> StoreResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, category, reorder_level, price FROM products ORDER BY id",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, product_id: i64) -> StoreResult<Product> {
        sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, category, reorder_level, price FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .map(Product::from)
        .ok_or_else(|| StoreError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn get_quantity_on_hand(&self, product_id: i64) -> StoreResult<Option<i64>> {
        let row = sqlx::query_scalar::<_, Option<i64>>(
            "SELECT quantity_on_hand FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(qoh) => Ok(qoh),
            None => Err(StoreError::NotFound(format!("Product {} not found", product_id))),
        }
    }

    async fn list_returns(&self) -> StoreResult<Vec<ReturnRecord>> {
        let rows = sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM returns ORDER BY return_id",
            RETURN_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(ReturnRecord::try_from).collect()
    }

    async fn get_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        sqlx::query_as::<_, ReturnRow>(&format!(
            "SELECT {} FROM returns WHERE return_id = $1",
            RETURN_COLUMNS
        ))
        .bind(return_id)
        .fetch_optional(&self.db)
        .await?
        .map(ReturnRecord::try_from)
        .transpose()?
        .ok_or_else(|| StoreError::NotFound(format!("Return {} not found", return_id)))
    }

    async fn create_return(&self, input: &NewReturn) -> StoreResult<ReturnRecord> {
        let mut tx = self.db.begin().await?;

        // Lock the sold line so concurrent returns against it are checked in turn
        let sold = sqlx::query_scalar::<_, i64>(
            "SELECT quantity FROM sale_lines WHERE id = $1 FOR UPDATE",
        )
        .bind(input.sale_detail_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            StoreError::NotFound(format!("Sale line {} not found", input.sale_detail_id))
        })?;

        let already_returned = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM returns
            WHERE sale_detail_id = $1 AND return_status <> $2
            "#,
        )
        .bind(input.sale_detail_id)
        .bind(ReturnStatus::Rejected.code())
        .fetch_one(&mut *tx)
        .await?;

        validate_return_quantity(input.quantity, sold, already_returned)
            .map_err(|m| StoreError::Rejected(m.to_string()))?;

        let row = sqlx::query_as::<_, ReturnRow>(&format!(
            r#"
            INSERT INTO returns (sale_detail_id, quantity, replacement_product_id,
                                 return_status, transaction_date, remarks)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            RETURN_COLUMNS
        ))
        .bind(input.sale_detail_id)
        .bind(input.quantity)
        .bind(input.replacement_product_id)
        .bind(ReturnStatus::Pending.code())
        .bind(input.transaction_date)
        .bind(&input.remarks)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        ReturnRecord::try_from(row)
    }

    async fn approve_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        self.apply_action(return_id, ReturnAction::Approve).await
    }

    async fn post_return(&self, return_id: i64, idempotency_key: &str) -> StoreResult<ReturnRecord> {
        let owner = self.posting_key_owner(idempotency_key).await?;
        if let Some(err) = posting_key_in_use(owner, return_id, idempotency_key) {
            return Err(err);
        }

        match self
            .transition_return(
                return_id,
                &[ReturnStatus::Approved],
                ReturnStatus::Posted,
                Some(idempotency_key),
            )
            .await
        {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(self.refused_transition(return_id, ReturnAction::Post).await),
            // Another post took the key between the lookup and the update
            Err(StoreError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                let owner = self.posting_key_owner(idempotency_key).await?;
                Err(posting_key_in_use(owner, return_id, idempotency_key).unwrap_or_else(|| {
                    StoreError::Rejected(format!(
                        "Idempotency key {} is already in use",
                        idempotency_key
                    ))
                }))
            }
            Err(e) => Err(e),
        }
    }

    async fn reject_return(&self, return_id: i64) -> StoreResult<ReturnRecord> {
        self.apply_action(return_id, ReturnAction::Reject).await
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }
}

/// Error for a posting key that already has an owner.
///
/// The same return is a replay (`Conflict`); any other return is `Rejected`.
fn posting_key_in_use(owner: Option<i64>, return_id: i64, idempotency_key: &str) -> Option<StoreError> {
    match owner? {
        owner if owner == return_id => Some(StoreError::Conflict(format!(
            "Return {} was already posted with this key",
            return_id
        ))),
        _ => Some(StoreError::Rejected(format!(
            "Idempotency key {} is already used by another return",
            idempotency_key
        ))),
    }
}
