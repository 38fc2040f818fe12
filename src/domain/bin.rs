// ==========================================
// VitalVida Sync Pipeline - Role stock bins
// ==========================================
// One bin per DA, keyed by the VitalVida da_code.
// ==========================================

use crate::domain::types::BinStatus;
use crate::domain::zone::Zone;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Bin suspension reason written when the owning agent leaves active duty
pub const AGENT_STATUS_REASON_PREFIX: &str = "agent_status:";

/// Bin suspension reason written by compliance enforcement
pub const COMPLIANCE_REASON: &str = "compliance";

// ==========================================
// Bin - Role stock bin
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub bin_id: String,
    pub external_da_code: String,
    pub zone: Zone,
    pub capacity_units: i64,
    pub current_stock_units: i64,
    pub current_stock_value: f64,
    pub status: BinStatus,
    pub suspension_reason: Option<String>,
    pub suspended_at: Option<NaiveDateTime>,
    pub updated_at: NaiveDateTime,
}

impl Bin {
    /// Stock / capacity; a zero-capacity bin is treated as full
    pub fn utilization(&self) -> f64 {
        if self.capacity_units <= 0 {
            return 1.0;
        }
        self.current_stock_units as f64 / self.capacity_units as f64
    }

    pub fn remaining_units(&self) -> i64 {
        (self.capacity_units - self.current_stock_units).max(0)
    }

    /// Suspended because the agent left active duty (not compliance, not manual)
    pub fn suspended_for_agent_status(&self) -> bool {
        self.status == BinStatus::Suspended
            && self
                .suspension_reason
                .as_deref()
                .is_some_and(|r| r.starts_with(AGENT_STATUS_REASON_PREFIX))
    }

    pub fn suspended_for_compliance(&self) -> bool {
        self.status == BinStatus::Suspended
            && self.suspension_reason.as_deref() == Some(COMPLIANCE_REASON)
    }
}
