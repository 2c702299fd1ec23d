//! Supply receipt records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A supply receipt header (goods received from a supplier)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supply {
    pub id: i64,
    pub supplier_id: Option<i64>,
    pub supplier_name: Option<String>,
    pub supplier_contact: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub remarks: Option<String>,
}

/// One product line on a supply receipt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplyLine {
    pub id: i64,
    pub supply_id: i64,
    pub product_id: Option<i64>,
    pub quantity: i64,
    pub unit_cost: Option<Decimal>,
    /// Timestamp of the line itself, used when the header cannot be resolved
    pub created_at: DateTime<Utc>,
}

/// Supplier associated with a product's most recent supply.
///
/// Derived on demand from the supply stream; never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupplierMapping {
    pub product_id: i64,
    pub supply_id: i64,
    pub supplier_id: Option<i64>,
    pub supplier_name: Option<String>,
    pub last_supplied_at: DateTime<Utc>,
    pub last_unit_cost: Option<Decimal>,
}

/// Find the supplier of the most recent supply line for a product.
///
/// Lines whose header is missing cannot name a supplier and are skipped.
/// When two supplies share a timestamp the one listed later wins.
pub fn latest_supplier(
    supplies: &[Supply],
    lines: &[SupplyLine],
    product_id: i64,
) -> Option<SupplierMapping> {
    let mut best: Option<SupplierMapping> = None;

    for line in lines.iter().filter(|l| l.product_id == Some(product_id)) {
        let Some(header) = supplies.iter().find(|s| s.id == line.supply_id) else {
            continue;
        };

        let newer = best
            .as_ref()
            .map(|b| header.transaction_date >= b.last_supplied_at)
            .unwrap_or(true);

        if newer {
            best = Some(SupplierMapping {
                product_id,
                supply_id: header.id,
                supplier_id: header.supplier_id,
                supplier_name: header.supplier_name.clone(),
                last_supplied_at: header.transaction_date,
                last_unit_cost: line.unit_cost,
            });
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn supply(id: i64, supplier: &str, day: u32) -> Supply {
        Supply {
            id,
            supplier_id: Some(id * 10),
            supplier_name: Some(supplier.to_string()),
            supplier_contact: None,
            transaction_date: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
            remarks: None,
        }
    }

    fn line(id: i64, supply_id: i64, product_id: i64) -> SupplyLine {
        SupplyLine {
            id,
            supply_id,
            product_id: Some(product_id),
            quantity: 5,
            unit_cost: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_latest_supplier_picks_most_recent_supply() {
        let supplies = vec![supply(1, "Shimano PH", 10), supply(2, "Trinx Cebu", 3)];
        let lines = vec![line(1, 1, 7), line(2, 2, 7)];

        let mapping = latest_supplier(&supplies, &lines, 7).unwrap();
        assert_eq!(mapping.supply_id, 1);
        assert_eq!(mapping.supplier_name.as_deref(), Some("Shimano PH"));
    }

    #[test]
    fn test_latest_supplier_none_without_supplies() {
        let supplies = vec![supply(1, "Shimano PH", 10)];
        let lines = vec![line(1, 1, 7)];
        assert!(latest_supplier(&supplies, &lines, 8).is_none());
    }

    #[test]
    fn test_latest_supplier_skips_orphan_lines() {
        let supplies = vec![supply(1, "Shimano PH", 1)];
        let lines = vec![line(1, 1, 7), line(2, 99, 7)];
        let mapping = latest_supplier(&supplies, &lines, 7).unwrap();
        assert_eq!(mapping.supply_id, 1);
    }
}
