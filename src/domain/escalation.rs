// ==========================================
// VitalVida Sync Pipeline - escalation requests
// ==========================================
// Expense/deduction approval. Above the threshold two
// distinct approvers holding distinct roles must sign off;
// at or below it a single approval is enough.
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationStatus {
    Pending,
    PartiallyApproved,
    Approved,
    Rejected,
    Expired,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EscalationStatus::Pending => "PENDING",
            EscalationStatus::PartiallyApproved => "PARTIALLY_APPROVED",
            EscalationStatus::Approved => "APPROVED",
            EscalationStatus::Rejected => "REJECTED",
            EscalationStatus::Expired => "EXPIRED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(EscalationStatus::Pending),
            "PARTIALLY_APPROVED" => Some(EscalationStatus::PartiallyApproved),
            "APPROVED" => Some(EscalationStatus::Approved),
            "REJECTED" => Some(EscalationStatus::Rejected),
            "EXPIRED" => Some(EscalationStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscalationStatus::Approved | EscalationStatus::Rejected | EscalationStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApproverRole {
    Finance,
    Operations,
}

impl ApproverRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApproverRole::Finance => "FINANCE",
            ApproverRole::Operations => "OPERATIONS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "FINANCE" => Some(ApproverRole::Finance),
            "OPERATIONS" => Some(ApproverRole::Operations),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub approver: String,
    pub role: ApproverRole,
    pub decided_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRequest {
    pub escalation_id: String,
    /// e.g. "salary_deduction"
    pub subject_type: String,
    pub subject_id: String,
    pub da_code: Option<String>,
    pub amount: f64,
    pub threshold: f64,
    pub required_approvals: u32,
    pub status: EscalationStatus,
    pub requested_by: String,
    pub approvals: Vec<Approval>,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
    pub decided_at: Option<NaiveDateTime>,
    pub rejection_reason: Option<String>,
}

pub const SUBJECT_SALARY_DEDUCTION: &str = "salary_deduction";

/// Approvals needed for an amount against the dual sign-off threshold
pub fn required_approvals(amount: f64, threshold: f64) -> u32 {
    if amount > threshold {
        2
    } else {
        1
    }
}

impl EscalationRequest {
    pub fn is_expired_at(&self, now: NaiveDateTime) -> bool {
        !self.status.is_terminal() && now >= self.expires_at
    }

    pub fn has_approved(&self, approver: &str) -> bool {
        self.approvals.iter().any(|a| a.approver == approver)
    }

    pub fn has_role(&self, role: ApproverRole) -> bool {
        self.approvals.iter().any(|a| a.role == role)
    }

    /// Status implied by the current approvals
    pub fn status_after_approvals(&self) -> EscalationStatus {
        let count = self.approvals.len() as u32;
        if count >= self.required_approvals {
            EscalationStatus::Approved
        } else if count > 0 {
            EscalationStatus::PartiallyApproved
        } else {
            EscalationStatus::Pending
        }
    }
}
