// ==========================================
// VitalVida Sync Pipeline - HandleComplianceAction
// ==========================================
// ComplianceAction -> score + status on both sides,
//                     ComplianceRecord (one per action),
//                     bin suspension / reactivation,
//                     salary deduction (+ escalation),
//                     agent SMS, ops alert on suspension
// Retry: 3 attempts, backoff 30s / 120s / 300s
// ==========================================

use crate::config::PipelineConfigReader;
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType, ChangeSet};
use crate::domain::audit_flag::AuditFlagType;
use crate::domain::bin::COMPLIANCE_REASON;
use crate::domain::compliance::ComplianceRecord;
use crate::domain::deduction::{DeductionStatus, SalaryDeduction};
use crate::domain::escalation::{
    required_approvals, EscalationRequest, EscalationStatus, SUBJECT_SALARY_DEDUCTION,
};
use crate::domain::notification::Notification;
use crate::domain::types::{BinStatus, ComplianceActionType, Severity};
use crate::engine::compliance_scoring::{ComplianceScoring, ScoreOutcome};
use crate::engine::status_mapping::role_status;
use crate::events::{DomainEvent, EventEnvelope, EventKind};
use crate::listeners::{lock_conn, record_failure, EventListener, ListenerError};
use crate::notify::templates;
use crate::queue::RetryPolicy;
use crate::repository::{
    ActionLogRepository, AgentRepository, BinRepository, ComplianceRecordRepository,
    DeductionRepository, EscalationRepository, NotificationRepository, ProcessedEventRepository,
    RoleAgentRepository,
};
use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, Transaction};
use std::sync::{Arc, Mutex};

pub const LISTENER_NAME: &str = "handle_compliance_action";

pub struct HandleComplianceAction {
    conn: Arc<Mutex<Connection>>,
    config: Arc<dyn PipelineConfigReader>,
}

/// Config read before the transaction opens
struct Settings {
    scoring: ComplianceScoring,
    escalation_threshold: f64,
    escalation_ttl_hours: i64,
    locale: String,
}

struct ActionPayload<'a> {
    action_id: &'a str,
    da_code: &'a str,
    action_type: ComplianceActionType,
    reason: &'a str,
    initiated_by: &'a str,
    amount: Option<f64>,
}

impl HandleComplianceAction {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<dyn PipelineConfigReader>) -> Self {
        Self { conn, config }
    }

    fn apply(
        &self,
        envelope: &EventEnvelope,
        action: ActionPayload<'_>,
        settings: &Settings,
    ) -> Result<(), ListenerError> {
        let now = now_ts();
        let mut guard = lock_conn(&self.conn)?;
        let tx = guard.transaction()?;

        if ProcessedEventRepository::is_processed_tx(&tx, &envelope.event_id, LISTENER_NAME)? {
            tracing::debug!(event_id = %envelope.event_id, "compliance event already handled");
            return Ok(());
        }
        if ComplianceRecordRepository::find_by_source_action_tx(&tx, action.action_id)?.is_some() {
            tracing::info!(action_id = action.action_id, "compliance action already recorded, skipped");
            ProcessedEventRepository::mark_processed_tx(&tx, &envelope.event_id, LISTENER_NAME, now)?;
            tx.commit()?;
            return Ok(());
        }

        let agent = AgentRepository::find_by_da_code_tx(&tx, action.da_code)?.ok_or_else(|| {
            ListenerError::Permanent(format!("delivery agent {} not found", action.da_code))
        })?;

        // ===== score + status =====
        let outcome = settings
            .scoring
            .evaluate(agent.compliance_score, agent.status, action.action_type);

        let mut changes = ChangeSet::new();
        changes.record(
            "agent",
            "compliance_score",
            Some(outcome.score_before.to_string()),
            Some(outcome.score_after.to_string()),
        );
        changes.record(
            "agent",
            "status",
            Some(outcome.status_before.to_string()),
            Some(outcome.status_after.to_string()),
        );

        AgentRepository::update_score_status_tx(&tx, &agent.agent_id, outcome.score_after, outcome.status_after, now)?;
        let mirrored = RoleAgentRepository::update_score_status_tx(
            &tx,
            action.da_code,
            outcome.score_after,
            role_status(outcome.status_after),
            &envelope.event_id,
            now,
        )?;
        if !mirrored {
            tracing::warn!(da_code = action.da_code, "no role mirror yet, score kept on VitalVida side only");
        }

        let record = ComplianceRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            source_action_id: action.action_id.to_string(),
            external_da_code: action.da_code.to_string(),
            action_type: action.action_type,
            points_delta: outcome.points_delta,
            score_before: outcome.score_before,
            score_after: outcome.score_after,
            status_before: outcome.status_before,
            status_after: outcome.status_after,
            reason: action.reason.to_string(),
            recorded_at: now,
        };
        ComplianceRecordRepository::insert_tx(&tx, &record)?;

        // ===== bin =====
        Self::enforce_bin(&tx, &action, &outcome, &mut changes, now)?;

        if outcome.became_suspended() {
            let score = outcome.score_after.to_string();
            let message = templates::render(
                templates::COMPLIANCE_SUSPENDED_ALERT,
                &settings.locale,
                &[("da_code", action.da_code), ("score", score.as_str())],
            );
            let alert = Notification::ops_alert(templates::COMPLIANCE_SUSPENDED_ALERT, Severity::Critical, message)
                .with_event(&envelope.event_id);
            NotificationRepository::insert_tx(&tx, &alert)?;
        }

        // ===== salary deduction =====
        let deduction = match action.action_type {
            ComplianceActionType::SalaryDeduction => {
                let amount = action.amount.filter(|a| *a > 0.0).ok_or_else(|| {
                    ListenerError::Permanent(format!(
                        "salary deduction {} has no positive amount",
                        action.action_id
                    ))
                })?;
                Some(Self::create_deduction(&tx, envelope, &action, amount, settings, now)?)
            }
            _ => None,
        };

        // ===== agent SMS =====
        let score = outcome.score_after.to_string();
        let amount = action.amount.map(templates::format_ngn).unwrap_or_default();
        let key = templates::compliance_key(action.action_type);
        let message = templates::render(
            &key,
            &settings.locale,
            &[("reason", action.reason), ("score", score.as_str()), ("amount", amount.as_str())],
        );
        let severity = if outcome.points_delta < 0 || outcome.became_suspended() {
            Severity::Warning
        } else {
            Severity::Info
        };
        let sms = Notification::to_agent(action.da_code, &key, severity, message).with_event(&envelope.event_id);
        NotificationRepository::insert_tx(&tx, &sms)?;

        // ===== audit =====
        let log = ActionLog::new(ActionType::ComplianceApplied, LISTENER_NAME)
            .with_event(&envelope.event_id)
            .with_da_code(action.da_code)
            .with_payload(&serde_json::json!({
                "action_id": action.action_id,
                "action_type": action.action_type.as_str(),
                "initiated_by": action.initiated_by,
                "points_delta": outcome.points_delta,
            }))
            .with_changes(&changes);
        ActionLogRepository::insert_tx(&tx, &log)?;

        ProcessedEventRepository::mark_processed_tx(&tx, &envelope.event_id, LISTENER_NAME, now)?;
        tx.commit()?;

        tracing::info!(
            event_id = %envelope.event_id,
            da_code = action.da_code,
            action_type = action.action_type.as_str(),
            score_before = outcome.score_before,
            score_after = outcome.score_after,
            status_after = outcome.status_after.as_str(),
            deduction = deduction.as_ref().map(|d| d.status.as_str()).unwrap_or("-"),
            "compliance action applied"
        );
        Ok(())
    }

    /// Suspend on a move to Suspended; reactivate on reinstatement. Locked bins stay locked.
    fn enforce_bin(
        tx: &Transaction<'_>,
        action: &ActionPayload<'_>,
        outcome: &ScoreOutcome,
        changes: &mut ChangeSet,
        now: NaiveDateTime,
    ) -> Result<(), ListenerError> {
        let Some(bin) = BinRepository::find_by_da_code_tx(tx, action.da_code)? else {
            return Ok(());
        };
        if bin.status == BinStatus::Locked {
            return Ok(());
        }

        if outcome.became_suspended() && !bin.suspended_for_compliance() {
            BinRepository::update_status_tx(tx, &bin.bin_id, BinStatus::Suspended, Some(COMPLIANCE_REASON), now)?;
            changes.record("bin", "status", Some(bin.status.to_string()), Some(BinStatus::Suspended.to_string()));
            changes.record(
                "bin",
                "suspension_reason",
                bin.suspension_reason.clone(),
                Some(COMPLIANCE_REASON.to_string()),
            );
        } else if action.action_type == ComplianceActionType::Reinstatement
            && outcome.status_after.can_hold_stock()
            && (bin.suspended_for_compliance() || bin.suspended_for_agent_status())
        {
            BinRepository::update_status_tx(tx, &bin.bin_id, BinStatus::Active, None, now)?;
            changes.record("bin", "status", Some(bin.status.to_string()), Some(BinStatus::Active.to_string()));
        }
        Ok(())
    }

    /// At or above the threshold the deduction waits on an escalation
    fn create_deduction(
        tx: &Transaction<'_>,
        envelope: &EventEnvelope,
        action: &ActionPayload<'_>,
        amount: f64,
        settings: &Settings,
        now: NaiveDateTime,
    ) -> Result<SalaryDeduction, ListenerError> {
        let deduction_id = uuid::Uuid::new_v4().to_string();
        let needs_escalation = amount >= settings.escalation_threshold;

        let escalation = needs_escalation.then(|| EscalationRequest {
            escalation_id: uuid::Uuid::new_v4().to_string(),
            subject_type: SUBJECT_SALARY_DEDUCTION.to_string(),
            subject_id: deduction_id.clone(),
            da_code: Some(action.da_code.to_string()),
            amount,
            threshold: settings.escalation_threshold,
            required_approvals: required_approvals(amount, settings.escalation_threshold),
            status: EscalationStatus::Pending,
            requested_by: action.initiated_by.to_string(),
            approvals: Vec::new(),
            created_at: now,
            expires_at: now + Duration::hours(settings.escalation_ttl_hours),
            decided_at: None,
            rejection_reason: None,
        });

        let deduction = SalaryDeduction {
            deduction_id,
            da_code: action.da_code.to_string(),
            amount,
            reason: action.reason.to_string(),
            source_action_id: action.action_id.to_string(),
            status: if needs_escalation {
                DeductionStatus::PendingApproval
            } else {
                DeductionStatus::Approved
            },
            escalation_id: escalation.as_ref().map(|e| e.escalation_id.clone()),
            created_at: now,
            decided_at: (!needs_escalation).then_some(now),
        };
        DeductionRepository::insert_tx(tx, &deduction)?;

        let amount_text = templates::format_ngn(amount);
        if let Some(request) = &escalation {
            EscalationRepository::insert_tx(tx, request)?;

            let approvals = request.required_approvals.to_string();
            let expires_at = request.expires_at.format("%Y-%m-%d %H:%M").to_string();
            let message = templates::render(
                templates::ESCALATION_CREATED,
                &settings.locale,
                &[
                    ("amount", amount_text.as_str()),
                    ("da_code", action.da_code),
                    ("approvals", approvals.as_str()),
                    ("expires_at", expires_at.as_str()),
                ],
            );
            let alert = Notification::ops_alert(templates::ESCALATION_CREATED, Severity::Warning, message)
                .with_event(&envelope.event_id);
            NotificationRepository::insert_tx(tx, &alert)?;

            let message = templates::render(
                templates::DEDUCTION_PENDING_APPROVAL,
                &settings.locale,
                &[("amount", amount_text.as_str())],
            );
            let sms = Notification::to_agent(action.da_code, templates::DEDUCTION_PENDING_APPROVAL, Severity::Info, message)
                .with_event(&envelope.event_id);
            NotificationRepository::insert_tx(tx, &sms)?;
        }

        let log = ActionLog::new(ActionType::DeductionCreated, LISTENER_NAME)
            .with_event(&envelope.event_id)
            .with_da_code(action.da_code)
            .with_payload(&deduction)
            .with_detail(format!(
                "NGN {} {}",
                amount_text,
                deduction.status.as_str()
            ));
        ActionLogRepository::insert_tx(tx, &log)?;

        Ok(deduction)
    }
}

#[async_trait]
impl EventListener for HandleComplianceAction {
    fn name(&self) -> &str {
        LISTENER_NAME
    }

    fn subscribes_to(&self) -> EventKind {
        EventKind::ComplianceAction
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(3, vec![30, 120, 300])
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), ListenerError> {
        let DomainEvent::ComplianceAction {
            action_id,
            da_code,
            action_type,
            reason,
            initiated_by,
            amount,
        } = &envelope.event
        else {
            return Err(ListenerError::Permanent(format!(
                "{} cannot handle {}",
                LISTENER_NAME,
                envelope.kind()
            )));
        };

        let settings = Settings {
            scoring: ComplianceScoring::from_config(self.config.as_ref()).await?,
            escalation_threshold: self.config.get_escalation_threshold().await?,
            escalation_ttl_hours: self.config.get_escalation_ttl_hours().await?,
            locale: self.config.get_notification_locale().await?,
        };
        let action = ActionPayload {
            action_id,
            da_code,
            action_type: *action_type,
            reason,
            initiated_by,
            amount: *amount,
        };

        self.apply(envelope, action, &settings)
    }

    async fn failed(&self, envelope: &EventEnvelope, error: &ListenerError) -> Result<(), ListenerError> {
        record_failure(&self.conn, LISTENER_NAME, envelope, AuditFlagType::ComplianceSyncFailed, error).map(|_| ())
    }
}
