//! The movement ledger: normalizing raw transaction streams into signed
//! stock movements and folding them into quantity on hand.
//!
//! Nothing here mutates a record. Stock is always a fold over the entries;
//! a correction is a new entry, never an edit of an old one.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Adjustment, ReturnRecord, Sale, SaleLine, Stockout, StockoutLine, Supply, SupplyLine};

/// Kind of stock movement, i.e. which stream it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    Supply,
    Sale,
    Stockout,
    Adjustment,
    Return,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Supply => "SUPPLY",
            MovementKind::Sale => "SALE",
            MovementKind::Stockout => "STOCKOUT",
            MovementKind::Adjustment => "ADJUSTMENT",
            MovementKind::Return => "RETURN",
        }
    }
}

impl std::fmt::Display for MovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One signed change to a product's stock
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementEntry {
    pub product_id: i64,
    /// Positive adds stock, negative removes it
    pub quantity: i64,
    pub kind: MovementKind,
    pub occurred_at: DateTime<Utc>,
    /// Human-readable origin, e.g. `SUP-12/40` (supply 12, line 40)
    pub source_ref: String,
    pub remarks: Option<String>,
}

impl MovementEntry {
    /// Key identifying this row in an edit buffer
    pub fn row_key(&self) -> String {
        format!("{}@{}", self.source_ref, self.product_id)
    }
}

/// A stockout header together with its (possibly empty) lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockoutRecord {
    pub header: Stockout,
    pub lines: Vec<StockoutLine>,
}

/// All raw records fetched from the store for one computation.
///
/// Lines are kept separate from their headers because the store may hand
/// back lines whose header can no longer be resolved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSet {
    pub supplies: Vec<Supply>,
    pub supply_lines: Vec<SupplyLine>,
    pub sales: Vec<Sale>,
    pub sale_lines: Vec<SaleLine>,
    pub stockouts: Vec<StockoutRecord>,
    pub adjustments: Vec<Adjustment>,
    pub returns: Vec<ReturnRecord>,
}

/// A raw record that could not be turned into movements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DroppedRecord {
    pub kind: MovementKind,
    pub source_ref: String,
    pub reason: String,
}

/// Output of normalizing a transaction set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Normalized {
    /// Entries in stream order: supplies, sales, stockouts, adjustments, returns
    pub entries: Vec<MovementEntry>,
    pub dropped: Vec<DroppedRecord>,
}

impl Normalized {
    /// Entries for a single product, stream order preserved
    pub fn for_product(&self, product_id: i64) -> Vec<MovementEntry> {
        self.entries
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect()
    }
}

/// Normalize every record in the set.
///
/// Malformed records (missing product reference, missing quantity, return
/// against an unknown sold line) are excluded and reported in `dropped`;
/// the rest of the set is still usable.
pub fn normalize(set: &TransactionSet) -> Normalized {
    let mut out = Normalized::default();

    let supplies: HashMap<i64, &Supply> = set.supplies.iter().map(|s| (s.id, s)).collect();
    for line in &set.supply_lines {
        normalize_supply_line(line, supplies.get(&line.supply_id).copied(), &mut out);
    }

    let sales: HashMap<i64, &Sale> = set.sales.iter().map(|s| (s.id, s)).collect();
    for line in &set.sale_lines {
        normalize_sale_line(line, sales.get(&line.sale_id).copied(), &mut out);
    }

    for stockout in &set.stockouts {
        normalize_stockout(stockout, &mut out);
    }

    for adjustment in &set.adjustments {
        normalize_adjustment(adjustment, &mut out);
    }

    let sale_lines: HashMap<i64, &SaleLine> = set.sale_lines.iter().map(|l| (l.id, l)).collect();
    for record in &set.returns {
        normalize_return(record, sale_lines.get(&record.sale_detail_id).copied(), &mut out);
    }

    out
}

/// One positive entry per supply line, dated by the parent supply.
///
/// When the header is missing the line's own timestamp is used instead.
pub fn normalize_supply_line(line: &SupplyLine, header: Option<&Supply>, out: &mut Normalized) {
    let source_ref = format!("SUP-{}/{}", line.supply_id, line.id);
    let Some(product_id) = line.product_id else {
        out.drop_record(MovementKind::Supply, source_ref, "supply line has no product");
        return;
    };

    out.entries.push(MovementEntry {
        product_id,
        quantity: line.quantity,
        kind: MovementKind::Supply,
        occurred_at: header.map(|h| h.transaction_date).unwrap_or(line.created_at),
        source_ref,
        remarks: header.and_then(|h| h.remarks.clone()),
    });
}

/// One negative entry per sold line
pub fn normalize_sale_line(line: &SaleLine, header: Option<&Sale>, out: &mut Normalized) {
    let source_ref = format!("SALE-{}/{}", line.sale_id, line.id);
    let Some(product_id) = line.product_id else {
        out.drop_record(MovementKind::Sale, source_ref, "sale line has no product");
        return;
    };

    out.entries.push(MovementEntry {
        product_id,
        quantity: -line.quantity,
        kind: MovementKind::Sale,
        occurred_at: header.map(|h| h.transaction_date).unwrap_or(line.created_at),
        source_ref,
        remarks: header.and_then(|h| h.receipt_no.clone()),
    });
}

/// Negative entries for a stockout: one per line, or one synthesized from
/// the header when the stockout has no lines.
pub fn normalize_stockout(record: &StockoutRecord, out: &mut Normalized) {
    let header = &record.header;

    if record.lines.is_empty() {
        let source_ref = format!("SO-{}", header.id);
        match (header.product_id, header.quantity) {
            (Some(product_id), Some(quantity)) => out.entries.push(MovementEntry {
                product_id,
                quantity: -quantity,
                kind: MovementKind::Stockout,
                occurred_at: header.transaction_date,
                source_ref,
                remarks: stockout_remarks(header),
            }),
            (None, _) => out.drop_record(MovementKind::Stockout, source_ref, "stockout has no product"),
            (_, None) => out.drop_record(MovementKind::Stockout, source_ref, "stockout has no quantity"),
        }
        return;
    }

    for line in &record.lines {
        let source_ref = format!("SO-{}/{}", header.id, line.id);
        let Some(product_id) = line.product_id else {
            out.drop_record(MovementKind::Stockout, source_ref, "stockout line has no product");
            continue;
        };

        out.entries.push(MovementEntry {
            product_id,
            quantity: -line.quantity,
            kind: MovementKind::Stockout,
            occurred_at: header.transaction_date,
            source_ref,
            remarks: stockout_remarks(header),
        });
    }
}

fn stockout_remarks(header: &Stockout) -> Option<String> {
    header.remarks.clone().or_else(|| header.reason.clone())
}

/// One entry per adjustment line, quantity taken as already signed
pub fn normalize_adjustment(adjustment: &Adjustment, out: &mut Normalized) {
    for line in &adjustment.lines {
        let source_ref = format!("ADJ-{}/{}", adjustment.id, line.id);
        let Some(product_id) = line.product_id else {
            out.drop_record(MovementKind::Adjustment, source_ref, "adjustment line has no product");
            continue;
        };

        out.entries.push(MovementEntry {
            product_id,
            quantity: line.quantity,
            kind: MovementKind::Adjustment,
            occurred_at: adjustment.transaction_date,
            source_ref,
            remarks: adjustment.remarks.clone(),
        });
    }
}

/// Entries for a posted return: the returned product goes back into stock,
/// a requested replacement goes out. Returns in any other state emit nothing.
pub fn normalize_return(record: &ReturnRecord, sold_line: Option<&SaleLine>, out: &mut Normalized) {
    if !record.return_status.affects_stock() {
        return;
    }

    let source_ref = format!("RET-{}", record.return_id);
    let Some(product_id) = sold_line.and_then(|l| l.product_id) else {
        out.drop_record(
            MovementKind::Return,
            source_ref,
            "returned sale line or its product cannot be resolved",
        );
        return;
    };

    out.entries.push(MovementEntry {
        product_id,
        quantity: record.quantity,
        kind: MovementKind::Return,
        occurred_at: record.transaction_date,
        source_ref: source_ref.clone(),
        remarks: record.remarks.clone(),
    });

    if let Some(replacement_id) = record.replacement_product_id {
        out.entries.push(MovementEntry {
            product_id: replacement_id,
            quantity: -record.quantity,
            kind: MovementKind::Return,
            occurred_at: record.transaction_date,
            source_ref: format!("{}/replacement", source_ref),
            remarks: record.remarks.clone(),
        });
    }
}

impl Normalized {
    fn drop_record(&mut self, kind: MovementKind, source_ref: String, reason: &str) {
        self.dropped.push(DroppedRecord {
            kind,
            source_ref,
            reason: reason.to_string(),
        });
    }
}

/// Quantity on hand for one product: the plain sum of its entries.
///
/// No clamping happens here; a negative result is a real finding.
pub fn project_quantity<'a, I>(entries: I, product_id: i64) -> i64
where
    I: IntoIterator<Item = &'a MovementEntry>,
{
    entries
        .into_iter()
        .filter(|e| e.product_id == product_id)
        .map(|e| e.quantity)
        .sum()
}

/// Projected stock of one product together with its latest movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StockLevel {
    pub product_id: i64,
    pub quantity: i64,
    pub last_movement_at: Option<DateTime<Utc>>,
}

/// Project every product that has at least one entry
pub fn stock_levels<'a, I>(entries: I) -> BTreeMap<i64, StockLevel>
where
    I: IntoIterator<Item = &'a MovementEntry>,
{
    let mut levels: BTreeMap<i64, StockLevel> = BTreeMap::new();

    for entry in entries {
        let level = levels.entry(entry.product_id).or_insert(StockLevel {
            product_id: entry.product_id,
            quantity: 0,
            last_movement_at: None,
        });
        level.quantity += entry.quantity;
        level.last_movement_at = Some(match level.last_movement_at {
            Some(at) if at >= entry.occurred_at => at,
            _ => entry.occurred_at,
        });
    }

    levels
}

/// Order entries newest first.
///
/// The sort is stable, so entries with equal timestamps keep the order in
/// which the streams were merged and repeated queries page identically.
pub fn sort_newest_first(entries: &mut [MovementEntry]) {
    entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdjustmentLine, AdjustmentType, ReturnStatus};
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap()
    }

    fn supply(id: i64, day: u32) -> Supply {
        Supply {
            id,
            supplier_id: Some(1),
            supplier_name: Some("Shimano PH".to_string()),
            supplier_contact: None,
            transaction_date: at(day),
            remarks: None,
        }
    }

    fn supply_line(id: i64, supply_id: i64, product_id: Option<i64>, quantity: i64) -> SupplyLine {
        SupplyLine {
            id,
            supply_id,
            product_id,
            quantity,
            unit_cost: None,
            created_at: at(28),
        }
    }

    fn sale_line(id: i64, sale_id: i64, product_id: i64, quantity: i64) -> SaleLine {
        SaleLine {
            id,
            sale_id,
            product_id: Some(product_id),
            quantity,
            unit_price: Decimal::from(250),
            created_at: at(3),
        }
    }

    fn stockout(id: i64, product_id: Option<i64>, quantity: Option<i64>) -> Stockout {
        Stockout {
            id,
            product_id,
            quantity,
            reason: Some("damaged".to_string()),
            transaction_date: at(4),
            remarks: None,
        }
    }

    fn return_record(id: i64, sale_detail_id: i64, status: ReturnStatus, replacement: Option<i64>) -> ReturnRecord {
        ReturnRecord {
            return_id: id,
            sale_detail_id,
            quantity: 1,
            replacement_product_id: replacement,
            return_status: status,
            transaction_date: at(6),
            remarks: None,
            posting_key: None,
        }
    }

    #[test]
    fn test_supply_line_uses_header_date() {
        let mut out = Normalized::default();
        let header = supply(1, 2);
        normalize_supply_line(&supply_line(10, 1, Some(7), 20), Some(&header), &mut out);

        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].quantity, 20);
        assert_eq!(out.entries[0].occurred_at, at(2));
        assert_eq!(out.entries[0].source_ref, "SUP-1/10");
    }

    #[test]
    fn test_supply_line_falls_back_to_own_timestamp() {
        let mut out = Normalized::default();
        normalize_supply_line(&supply_line(10, 99, Some(7), 20), None, &mut out);

        assert_eq!(out.entries[0].occurred_at, at(28));
        assert!(out.dropped.is_empty());
    }

    #[test]
    fn test_sale_line_is_negative() {
        let mut out = Normalized::default();
        normalize_sale_line(&sale_line(1, 1, 7, 3), None, &mut out);
        assert_eq!(out.entries[0].quantity, -3);
        assert_eq!(out.entries[0].kind, MovementKind::Sale);
    }

    #[test]
    fn test_header_only_stockout_is_synthesized() {
        let mut out = Normalized::default();
        let record = StockoutRecord {
            header: stockout(5, Some(7), Some(2)),
            lines: vec![],
        };
        normalize_stockout(&record, &mut out);

        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].quantity, -2);
        assert_eq!(out.entries[0].source_ref, "SO-5");
        assert_eq!(out.entries[0].remarks.as_deref(), Some("damaged"));
    }

    #[test]
    fn test_stockout_lines_take_precedence_over_header() {
        let mut out = Normalized::default();
        let record = StockoutRecord {
            header: stockout(5, Some(7), Some(99)),
            lines: vec![
                StockoutLine { id: 1, stockout_id: 5, product_id: Some(7), quantity: 1 },
                StockoutLine { id: 2, stockout_id: 5, product_id: Some(8), quantity: 4 },
            ],
        };
        normalize_stockout(&record, &mut out);

        let quantities: Vec<i64> = out.entries.iter().map(|e| e.quantity).collect();
        assert_eq!(quantities, vec![-1, -4]);
    }

    #[test]
    fn test_malformed_records_are_dropped_not_fatal() {
        let set = TransactionSet {
            supplies: vec![supply(1, 1)],
            supply_lines: vec![supply_line(1, 1, None, 5), supply_line(2, 1, Some(7), 5)],
            stockouts: vec![StockoutRecord {
                header: stockout(2, None, Some(1)),
                lines: vec![],
            }],
            ..Default::default()
        };

        let normalized = normalize(&set);
        assert_eq!(normalized.entries.len(), 1);
        assert_eq!(normalized.dropped.len(), 2);
        assert_eq!(normalized.dropped[0].source_ref, "SUP-1/1");
        assert_eq!(normalized.dropped[1].kind, MovementKind::Stockout);
    }

    #[test]
    fn test_adjustment_quantities_are_verbatim() {
        let adjustment = Adjustment {
            id: 3,
            client_request_id: "req-1".to_string(),
            adjustment_type: AdjustmentType::Correction,
            transaction_date: at(5),
            remarks: Some("recount".to_string()),
            lines: vec![
                AdjustmentLine { id: 1, adjustment_id: 3, product_id: Some(7), quantity: -2 },
                AdjustmentLine { id: 2, adjustment_id: 3, product_id: Some(8), quantity: 5 },
            ],
        };
        let mut out = Normalized::default();
        normalize_adjustment(&adjustment, &mut out);

        assert_eq!(out.entries[0].quantity, -2);
        assert_eq!(out.entries[1].quantity, 5);
        assert_eq!(out.entries[1].remarks.as_deref(), Some("recount"));
    }

    #[test]
    fn test_only_posted_returns_emit() {
        let sold = sale_line(40, 9, 7, 1);
        for status in [ReturnStatus::Pending, ReturnStatus::Approved, ReturnStatus::Rejected] {
            let mut out = Normalized::default();
            normalize_return(&return_record(1, 40, status, None), Some(&sold), &mut out);
            assert!(out.entries.is_empty(), "{} emitted movements", status);
        }

        let mut out = Normalized::default();
        normalize_return(&return_record(1, 40, ReturnStatus::Posted, None), Some(&sold), &mut out);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].quantity, 1);
        assert_eq!(out.entries[0].product_id, 7);
    }

    #[test]
    fn test_posted_return_with_replacement_emits_two_entries() {
        let sold = sale_line(40, 9, 7, 1);
        let mut out = Normalized::default();
        normalize_return(&return_record(1, 40, ReturnStatus::Posted, Some(8)), Some(&sold), &mut out);

        assert_eq!(out.entries.len(), 2);
        assert_eq!((out.entries[0].product_id, out.entries[0].quantity), (7, 1));
        assert_eq!((out.entries[1].product_id, out.entries[1].quantity), (8, -1));
        assert_ne!(out.entries[0].row_key(), out.entries[1].row_key());
    }

    #[test]
    fn test_posted_return_without_sold_line_is_dropped() {
        let mut out = Normalized::default();
        normalize_return(&return_record(1, 40, ReturnStatus::Posted, None), None, &mut out);
        assert!(out.entries.is_empty());
        assert_eq!(out.dropped.len(), 1);
    }

    #[test]
    fn test_projection_of_unknown_product_is_zero() {
        assert_eq!(project_quantity(&Vec::<MovementEntry>::new(), 42), 0);
    }

    #[test]
    fn test_projection_is_not_clamped() {
        let set = TransactionSet {
            sales: vec![],
            sale_lines: vec![sale_line(1, 1, 7, 3)],
            ..Default::default()
        };
        let normalized = normalize(&set);
        assert_eq!(project_quantity(&normalized.entries, 7), -3);
    }

    #[test]
    fn test_stock_levels_track_latest_movement() {
        let set = TransactionSet {
            supplies: vec![supply(1, 2)],
            supply_lines: vec![supply_line(1, 1, Some(7), 10)],
            sale_lines: vec![sale_line(1, 1, 7, 4)],
            ..Default::default()
        };
        let levels = stock_levels(&normalize(&set).entries);
        let level = levels[&7];
        assert_eq!(level.quantity, 6);
        assert_eq!(level.last_movement_at, Some(at(3)));
    }

    #[test]
    fn test_sort_newest_first_is_stable() {
        let entry = |source: &str, day: u32| MovementEntry {
            product_id: 1,
            quantity: 1,
            kind: MovementKind::Adjustment,
            occurred_at: at(day),
            source_ref: source.to_string(),
            remarks: None,
        };
        let mut entries = vec![entry("a", 1), entry("b", 2), entry("c", 2), entry("d", 3)];
        sort_newest_first(&mut entries);

        let order: Vec<&str> = entries.iter().map(|e| e.source_ref.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "c", "a"]);
    }

    fn entry_strategy() -> impl Strategy<Value = MovementEntry> {
        (1i64..4, -50i64..50, 1u32..28).prop_map(|(product_id, quantity, day)| MovementEntry {
            product_id,
            quantity,
            kind: MovementKind::Adjustment,
            occurred_at: at(day),
            source_ref: format!("ADJ-{}", day),
            remarks: None,
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_projection_ignores_fold_order(
            mut entries in prop::collection::vec(entry_strategy(), 0..40),
        ) {
            let forward = project_quantity(&entries, 2);
            entries.reverse();
            let backward = project_quantity(&entries, 2);
            sort_newest_first(&mut entries);
            let sorted = project_quantity(&entries, 2);

            prop_assert_eq!(forward, backward);
            prop_assert_eq!(forward, sorted);
        }

        #[test]
        fn prop_stock_levels_agree_with_projection(
            entries in prop::collection::vec(entry_strategy(), 0..40),
        ) {
            let levels = stock_levels(&entries);
            for product_id in 1..4 {
                let expected = project_quantity(&entries, product_id);
                let actual = levels.get(&product_id).map(|l| l.quantity).unwrap_or(0);
                prop_assert_eq!(expected, actual);
            }
        }
    }
}
