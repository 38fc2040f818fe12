// ==========================================
// VitalVida Sync Pipeline - bin capacity check
// ==========================================
// Classifies an incoming allocation against the bin's
// remaining capacity. Over-capacity stock is still applied
// by the listener; this only reports.
// ==========================================

use crate::domain::bin::Bin;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapacityCheck {
    Fits,
    /// Utilization after the allocation reaches the near-capacity ratio
    NearCapacity { utilization: f64 },
    /// Units after the allocation exceed capacity
    OverCapacity { excess_units: i64 },
}

#[derive(Debug, Clone, Copy)]
pub struct BinCapacity {
    near_capacity_ratio: f64,
}

impl BinCapacity {
    pub fn new(near_capacity_ratio: f64) -> Self {
        Self {
            near_capacity_ratio,
        }
    }

    pub fn check(&self, bin: &Bin, incoming_units: i64) -> CapacityCheck {
        let after = bin.current_stock_units.saturating_add(incoming_units);
        if after > bin.capacity_units {
            return CapacityCheck::OverCapacity {
                excess_units: after.saturating_sub(bin.capacity_units),
            };
        }

        let utilization = if bin.capacity_units <= 0 {
            1.0
        } else {
            after as f64 / bin.capacity_units as f64
        };
        if utilization >= self.near_capacity_ratio {
            CapacityCheck::NearCapacity { utilization }
        } else {
            CapacityCheck::Fits
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BinStatus;
    use crate::domain::zone::Zone;

    fn bin(capacity: i64, stock: i64) -> Bin {
        Bin {
            bin_id: "b1".to_string(),
            external_da_code: "DA-0007".to_string(),
            zone: Zone::Ibadan,
            capacity_units: capacity,
            current_stock_units: stock,
            current_stock_value: 0.0,
            status: BinStatus::Active,
            suspension_reason: None,
            suspended_at: None,
            updated_at: crate::db::now_ts(),
        }
    }

    #[test]
    fn test_check_classification() {
        let c = BinCapacity::new(0.9);
        assert_eq!(c.check(&bin(500, 100), 50), CapacityCheck::Fits);
        assert_eq!(
            c.check(&bin(500, 400), 50),
            CapacityCheck::NearCapacity { utilization: 0.9 }
        );
        assert_eq!(c.check(&bin(500, 500), 0), CapacityCheck::NearCapacity { utilization: 1.0 });
        assert_eq!(
            c.check(&bin(500, 480), 40),
            CapacityCheck::OverCapacity { excess_units: 20 }
        );
    }

    #[test]
    fn test_huge_incoming_units_saturate() {
        let c = BinCapacity::new(0.9);
        assert_eq!(
            c.check(&bin(500, 100), i64::MAX),
            CapacityCheck::OverCapacity {
                excess_units: i64::MAX - 500
            }
        );
    }

    #[test]
    fn test_zero_capacity_bin() {
        let c = BinCapacity::new(0.9);
        assert_eq!(
            c.check(&bin(0, 0), 1),
            CapacityCheck::OverCapacity { excess_units: 1 }
        );
    }
}
