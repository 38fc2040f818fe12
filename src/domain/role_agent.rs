// ==========================================
// VitalVida Sync Pipeline - Role-side DA mirror
// ==========================================
// The Role system keeps its own copy of each DA, keyed by
// the VitalVida da_code. Status uses Role vocabulary.
// ==========================================

use crate::domain::zone::Zone;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAgent {
    pub role_agent_id: String,
    pub external_da_code: String,
    pub full_name: String,
    pub phone: String,
    pub zone: Zone,
    /// Role-side status vocabulary: active / probation / suspended / inactive
    pub status: String,
    pub compliance_score: i32,
    pub last_event_id: Option<String>,
    pub synced_at: NaiveDateTime,
}
