// ==========================================
// VitalVida Sync Pipeline - compliance actions and records
// ==========================================
// ComplianceAction: what operations recorded (VitalVida side)
// ComplianceRecord: what enforcement applied (Role side)
// ==========================================

use crate::domain::types::{AgentStatus, ComplianceActionType};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAction {
    pub action_id: String,
    pub da_code: String,
    pub action_type: ComplianceActionType,
    pub reason: String,
    pub initiated_by: String,
    /// NGN, salary deductions only
    pub amount: Option<f64>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    pub record_id: String,
    /// One record per ComplianceAction
    pub source_action_id: String,
    pub external_da_code: String,
    pub action_type: ComplianceActionType,
    pub points_delta: i32,
    pub score_before: i32,
    pub score_after: i32,
    pub status_before: AgentStatus,
    pub status_after: AgentStatus,
    pub reason: String,
    pub recorded_at: NaiveDateTime,
}

impl ComplianceRecord {
    pub fn status_changed(&self) -> bool {
        self.status_before != self.status_after
    }
}
