// ==========================================
// VitalVida Sync Pipeline - audit flags
// ==========================================
// Raised by listeners when something needs a human:
// inconsistent payloads, stock pushed to a suspended bin,
// exhausted retries.
// ==========================================

use crate::domain::types::Severity;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditFlagType {
    StockValueMismatch,
    AllocationToSuspendedBin,
    BinOverCapacity,
    AgentSyncFailed,
    StockSyncFailed,
    ComplianceSyncFailed,
}

impl AuditFlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditFlagType::StockValueMismatch => "STOCK_VALUE_MISMATCH",
            AuditFlagType::AllocationToSuspendedBin => "ALLOCATION_TO_SUSPENDED_BIN",
            AuditFlagType::BinOverCapacity => "BIN_OVER_CAPACITY",
            AuditFlagType::AgentSyncFailed => "AGENT_SYNC_FAILED",
            AuditFlagType::StockSyncFailed => "STOCK_SYNC_FAILED",
            AuditFlagType::ComplianceSyncFailed => "COMPLIANCE_SYNC_FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "STOCK_VALUE_MISMATCH" => Some(AuditFlagType::StockValueMismatch),
            "ALLOCATION_TO_SUSPENDED_BIN" => Some(AuditFlagType::AllocationToSuspendedBin),
            "BIN_OVER_CAPACITY" => Some(AuditFlagType::BinOverCapacity),
            "AGENT_SYNC_FAILED" => Some(AuditFlagType::AgentSyncFailed),
            "STOCK_SYNC_FAILED" => Some(AuditFlagType::StockSyncFailed),
            "COMPLIANCE_SYNC_FAILED" => Some(AuditFlagType::ComplianceSyncFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagStatus {
    Open,
    Resolved,
}

impl FlagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagStatus::Open => "OPEN",
            FlagStatus::Resolved => "RESOLVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(FlagStatus::Open),
            "RESOLVED" => Some(FlagStatus::Resolved),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFlag {
    pub flag_id: String,
    pub da_code: Option<String>,
    pub flag_type: AuditFlagType,
    pub severity: Severity,
    pub details: Option<JsonValue>,
    pub status: FlagStatus,
    /// Listener or API that raised the flag
    pub raised_by: String,
    pub related_event_id: Option<String>,
    pub created_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
    pub resolved_by: Option<String>,
    pub resolution_note: Option<String>,
}

impl AuditFlag {
    pub fn new(flag_type: AuditFlagType, severity: Severity, raised_by: &str) -> Self {
        Self {
            flag_id: uuid::Uuid::new_v4().to_string(),
            da_code: None,
            flag_type,
            severity,
            details: None,
            status: FlagStatus::Open,
            raised_by: raised_by.to_string(),
            related_event_id: None,
            created_at: crate::db::now_ts(),
            resolved_at: None,
            resolved_by: None,
            resolution_note: None,
        }
    }

    pub fn for_agent(mut self, da_code: &str) -> Self {
        self.da_code = Some(da_code.to_string());
        self
    }

    pub fn with_event(mut self, event_id: &str) -> Self {
        self.related_event_id = Some(event_id.to_string());
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}
