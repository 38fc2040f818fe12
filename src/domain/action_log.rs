// ==========================================
// VitalVida Sync Pipeline - action log (audit trail)
// ==========================================
// Rule: every mutation the pipeline makes is logged
// Use: audit trail, "why is this bin suspended?" answers
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub event_id: Option<String>, // None for API-originated actions
    pub action_type: String,
    pub action_ts: NaiveDateTime,
    pub actor: String,            // listener name or user id

    pub payload_json: Option<JsonValue>,
    pub changes_json: Option<JsonValue>,

    pub da_code: Option<String>,
    pub detail: Option<String>,
}

// ==========================================
// ActionType
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    // API side
    AgentRegistered,
    AgentUpdated,
    StockAllocated,
    ComplianceRecorded,
    EscalationDecided,
    FlagResolved,
    JobRetried,
    // listener side
    RoleAgentSynced,
    BinCreated,
    BinStatusChanged,
    StockApplied,
    AllocationRejected,
    ComplianceApplied,
    DeductionCreated,
    ListenerFailed,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::AgentRegistered => "AgentRegistered",
            ActionType::AgentUpdated => "AgentUpdated",
            ActionType::StockAllocated => "StockAllocated",
            ActionType::ComplianceRecorded => "ComplianceRecorded",
            ActionType::EscalationDecided => "EscalationDecided",
            ActionType::FlagResolved => "FlagResolved",
            ActionType::JobRetried => "JobRetried",
            ActionType::RoleAgentSynced => "RoleAgentSynced",
            ActionType::BinCreated => "BinCreated",
            ActionType::BinStatusChanged => "BinStatusChanged",
            ActionType::StockApplied => "StockApplied",
            ActionType::AllocationRejected => "AllocationRejected",
            ActionType::ComplianceApplied => "ComplianceApplied",
            ActionType::DeductionCreated => "DeductionCreated",
            ActionType::ListenerFailed => "ListenerFailed",
        }
    }
}

// ==========================================
// FieldChange / ChangeSet - before/after diff
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub entity: String, // "role_agent", "bin", "agent"
    pub field: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<FieldChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change; no-op when before == after
    pub fn record(
        &mut self,
        entity: &str,
        field: &str,
        before: Option<String>,
        after: Option<String>,
    ) {
        if before == after {
            return;
        }
        self.changes.push(FieldChange {
            entity: entity.to_string(),
            field: field.to_string(),
            before,
            after,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn touches(&self, entity: &str, field: &str) -> bool {
        self.changes
            .iter()
            .any(|c| c.entity == entity && c.field == field)
    }

    /// "bin.status: ACTIVE→SUSPENDED, agent.score: 70→45"
    pub fn summary_text(&self) -> String {
        if self.changes.is_empty() {
            return "no changes".to_string();
        }
        self.changes
            .iter()
            .map(|c| {
                format!(
                    "{}.{}: {}→{}",
                    c.entity,
                    c.field,
                    c.before.as_deref().unwrap_or("∅"),
                    c.after.as_deref().unwrap_or("∅")
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl ActionLog {
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            event_id: None,
            action_type: action_type.as_str().to_string(),
            action_ts: crate::db::now_ts(),
            actor: actor.to_string(),
            payload_json: None,
            changes_json: None,
            da_code: None,
            detail: None,
        }
    }

    pub fn with_event(mut self, event_id: &str) -> Self {
        self.event_id = Some(event_id.to_string());
        self
    }

    pub fn with_da_code(mut self, da_code: &str) -> Self {
        self.da_code = Some(da_code.to_string());
        self
    }

    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Self {
        self.payload_json = serde_json::to_value(payload).ok();
        self
    }

    /// Attach the diff and use its summary as the detail line
    pub fn with_changes(mut self, changes: &ChangeSet) -> Self {
        self.changes_json = serde_json::to_value(changes).ok();
        self.detail = Some(changes.summary_text());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
