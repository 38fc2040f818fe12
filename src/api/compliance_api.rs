// ==========================================
// VitalVida Sync Pipeline - compliance API
// ==========================================
// record actions (-> ComplianceAction event),
// audit flag review, Role-side compliance history
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{normalize_da_code, Validator};
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::audit_flag::AuditFlag;
use crate::domain::compliance::{ComplianceAction, ComplianceRecord};
use crate::domain::types::ComplianceActionType;
use crate::events::{DomainEvent, EventEnvelope, OptionalEventPublisher};
use crate::repository::{
    ActionLogRepository, AgentRepository, AuditFlagRepository, ComplianceActionRepository,
    ComplianceRecordRepository,
};

const EVENT_SOURCE: &str = "compliance_api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordActionRequest {
    pub da_code: String,
    pub action_type: ComplianceActionType,
    pub reason: String,
    pub initiated_by: String,
    /// NGN; required for salary deductions, rejected otherwise
    pub amount: Option<f64>,
}

pub struct ComplianceApi {
    agent_repo: Arc<AgentRepository>,
    action_repo: Arc<ComplianceActionRepository>,
    record_repo: Arc<ComplianceRecordRepository>,
    flag_repo: Arc<AuditFlagRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    publisher: OptionalEventPublisher,
}

impl ComplianceApi {
    pub fn new(
        agent_repo: Arc<AgentRepository>,
        action_repo: Arc<ComplianceActionRepository>,
        record_repo: Arc<ComplianceRecordRepository>,
        flag_repo: Arc<AuditFlagRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            agent_repo,
            action_repo,
            record_repo,
            flag_repo,
            action_log_repo,
            publisher,
        }
    }

    pub fn record_action(&self, req: RecordActionRequest) -> ApiResult<ComplianceAction> {
        let da_code = normalize_da_code(&req.da_code);

        let mut v = Validator::new();
        v.require_non_empty("reason", &req.reason);
        v.require_non_empty("initiated_by", &req.initiated_by);
        match (req.action_type.requires_amount(), req.amount) {
            (true, None) => v.push("amount", "required for a salary deduction"),
            (true, Some(a)) => v.check(a.is_finite() && a > 0.0, "amount", "must be greater than 0"),
            (false, Some(_)) => v.push("amount", format!("not allowed for {}", req.action_type)),
            (false, None) => {}
        }
        v.finish()?;

        if self.agent_repo.find_by_da_code(&da_code)?.is_none() {
            return Err(ApiError::NotFound(format!("DeliveryAgent (da_code={})", da_code)));
        }

        let action = ComplianceAction {
            action_id: uuid::Uuid::new_v4().to_string(),
            da_code: da_code.clone(),
            action_type: req.action_type,
            reason: req.reason.trim().to_string(),
            initiated_by: req.initiated_by.trim().to_string(),
            amount: req.amount.map(|a| (a * 100.0).round() / 100.0),
            created_at: now_ts(),
        };
        self.action_repo.insert(&action)?;

        let envelope = EventEnvelope::new(
            DomainEvent::ComplianceAction {
                action_id: action.action_id.clone(),
                da_code: action.da_code.clone(),
                action_type: action.action_type,
                reason: action.reason.clone(),
                initiated_by: action.initiated_by.clone(),
                amount: action.amount,
            },
            EVENT_SOURCE,
        );
        let event_id = envelope.event_id.clone();
        if let Err(e) = self.publisher.publish(envelope) {
            warn!(%da_code, action_id = %action.action_id, error = %e, "publish failed, action undone");
            self.action_repo.delete(&action.action_id)?;
            return Err(e.into());
        }

        let log = ActionLog::new(ActionType::ComplianceRecorded, &action.initiated_by)
            .with_event(&event_id)
            .with_da_code(&da_code)
            .with_payload(&action)
            .with_detail(format!("{}: {}", action.action_type, action.reason));
        self.action_log_repo.insert(&log)?;

        info!(
            %da_code,
            action_id = %action.action_id,
            action_type = action.action_type.as_str(),
            %event_id,
            "compliance action recorded"
        );
        Ok(action)
    }

    /// Actions recorded for a DA (VitalVida side), newest first
    pub fn list_actions(&self, da_code: &str) -> ApiResult<Vec<ComplianceAction>> {
        Ok(self.action_repo.list_by_da_code(&normalize_da_code(da_code))?)
    }

    /// Enforcement applied to a DA (Role side), newest first
    pub fn list_records(&self, da_code: &str) -> ApiResult<Vec<ComplianceRecord>> {
        Ok(self.record_repo.list_by_da_code(&normalize_da_code(da_code))?)
    }

    /// Open flags, most severe first
    pub fn list_open_flags(&self, limit: i64) -> ApiResult<Vec<AuditFlag>> {
        Ok(self.flag_repo.list_open(limit)?)
    }

    pub fn list_flags_for_agent(&self, da_code: &str) -> ApiResult<Vec<AuditFlag>> {
        Ok(self.flag_repo.list_by_da_code(&normalize_da_code(da_code))?)
    }

    pub fn resolve_flag(&self, flag_id: &str, resolved_by: &str, note: Option<&str>) -> ApiResult<AuditFlag> {
        let mut v = Validator::new();
        v.require_non_empty("resolved_by", resolved_by);
        v.finish()?;

        self.flag_repo.resolve(flag_id, resolved_by.trim(), note, now_ts())?;
        let flag = self
            .flag_repo
            .find_by_id(flag_id)?
            .ok_or_else(|| ApiError::NotFound(format!("AuditFlag (id={})", flag_id)))?;

        let mut log = ActionLog::new(ActionType::FlagResolved, resolved_by.trim())
            .with_detail(format!("{} {}", flag.flag_type.as_str(), note.unwrap_or("")).trim_end().to_string());
        if let Some(da_code) = &flag.da_code {
            log = log.with_da_code(da_code);
        }
        self.action_log_repo.insert(&log)?;

        info!(%flag_id, flag_type = flag.flag_type.as_str(), resolved_by, "audit flag resolved");
        Ok(flag)
    }
}
