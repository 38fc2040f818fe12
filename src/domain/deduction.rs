// ==========================================
// VitalVida Sync Pipeline - salary deductions
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeductionStatus {
    PendingApproval,
    Approved,
    Cancelled,
}

impl DeductionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeductionStatus::PendingApproval => "PENDING_APPROVAL",
            DeductionStatus::Approved => "APPROVED",
            DeductionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING_APPROVAL" => Some(DeductionStatus::PendingApproval),
            "APPROVED" => Some(DeductionStatus::Approved),
            "CANCELLED" => Some(DeductionStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalaryDeduction {
    pub deduction_id: String,
    pub da_code: String,
    /// NGN
    pub amount: f64,
    pub reason: String,
    pub source_action_id: String,
    pub status: DeductionStatus,
    pub escalation_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub decided_at: Option<NaiveDateTime>,
}
