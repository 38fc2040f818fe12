// ==========================================
// VitalVida Sync Pipeline - stock allocation
// ==========================================
// Invariant: stock_value = Σ quantity × unit_price over items
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Tolerance for comparing naira amounts (kobo rounding)
pub const STOCK_VALUE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationItem {
    pub product_code: String,
    pub quantity: i64,
    /// NGN per unit
    pub unit_price: f64,
}

impl AllocationItem {
    pub fn line_total(&self) -> f64 {
        self.quantity as f64 * self.unit_price
    }
}

// ==========================================
// StockAllocation - stock handed to a DA
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAllocation {
    pub allocation_id: String,
    pub agent_id: String,
    pub da_code: String,
    pub items: Vec<AllocationItem>,
    pub stock_value: f64,
    pub total_units: i64,
    pub allocated_by: String,
    pub allocated_at: NaiveDateTime,
}

/// Σ line totals, rounded to kobo
pub fn compute_stock_value(items: &[AllocationItem]) -> f64 {
    let sum: f64 = items.iter().map(AllocationItem::line_total).sum();
    (sum * 100.0).round() / 100.0
}

/// None when the sum does not fit in an i64
pub fn total_units(items: &[AllocationItem]) -> Option<i64> {
    items.iter().try_fold(0i64, |acc, i| acc.checked_add(i.quantity))
}

/// Does a declared value agree with the item lines?
pub fn stock_value_matches(items: &[AllocationItem], declared: f64) -> bool {
    (compute_stock_value(items) - declared).abs() <= STOCK_VALUE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> Vec<AllocationItem> {
        vec![
            AllocationItem {
                product_code: "VV-MORINGA-250".to_string(),
                quantity: 12,
                unit_price: 3_500.0,
            },
            AllocationItem {
                product_code: "VV-GINGER-100".to_string(),
                quantity: 3,
                unit_price: 1_250.5,
            },
        ]
    }

    #[test]
    fn test_stock_value_is_sum_of_line_totals() {
        assert_eq!(compute_stock_value(&items()), 45_751.5);
        assert_eq!(total_units(&items()), Some(15));
    }

    #[test]
    fn test_total_units_overflow() {
        let mut lines = items();
        lines[0].quantity = i64::MAX;
        assert_eq!(total_units(&lines), None);
    }

    #[test]
    fn test_stock_value_matches_with_tolerance() {
        assert!(stock_value_matches(&items(), 45_751.5));
        assert!(stock_value_matches(&items(), 45_751.505));
        assert!(!stock_value_matches(&items(), 45_700.0));
        assert!(stock_value_matches(&[], 0.0));
    }
}
