// ==========================================
// VitalVida Sync Pipeline - SyncAgentToRoleSystem
// ==========================================
// AgentUpdated -> Role mirror upsert, bin creation,
//                 bin status/zone following the agent
// Retry: 3 attempts, backoff 10s / 30s / 60s
// ==========================================

use crate::config::PipelineConfigReader;
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType, ChangeSet};
use crate::domain::audit_flag::AuditFlagType;
use crate::domain::bin::Bin;
use crate::domain::notification::Notification;
use crate::domain::role_agent::RoleAgent;
use crate::domain::types::{BinStatus, Severity};
use crate::engine::status_mapping::{bin_transition, role_status, BinTransition};
use crate::events::{DomainEvent, EventEnvelope, EventKind};
use crate::listeners::{lock_conn, record_failure, EventListener, ListenerError};
use crate::notify::templates;
use crate::queue::RetryPolicy;
use crate::repository::{
    ActionLogRepository, AgentRepository, BinRepository, NotificationRepository,
    ProcessedEventRepository, RoleAgentRepository,
};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub const LISTENER_NAME: &str = "sync_agent_to_role_system";

pub struct SyncAgentToRoleSystem {
    conn: Arc<Mutex<Connection>>,
    config: Arc<dyn PipelineConfigReader>,
}

impl SyncAgentToRoleSystem {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<dyn PipelineConfigReader>) -> Self {
        Self { conn, config }
    }

    fn apply(
        &self,
        envelope: &EventEnvelope,
        agent_id: &str,
        changed_fields: &[String],
        default_capacity: i64,
        locale: &str,
    ) -> Result<(), ListenerError> {
        let now = now_ts();
        let mut guard = lock_conn(&self.conn)?;
        let tx = guard.transaction()?;

        if ProcessedEventRepository::is_processed_tx(&tx, &envelope.event_id, LISTENER_NAME)? {
            tracing::debug!(event_id = %envelope.event_id, "agent event already synced");
            return Ok(());
        }

        let agent = AgentRepository::find_by_id_tx(&tx, agent_id)?.ok_or_else(|| {
            ListenerError::Permanent(format!("delivery agent {} not found", agent_id))
        })?;

        let mut changes = ChangeSet::new();

        // ===== Role mirror =====
        let existing = RoleAgentRepository::find_by_da_code_tx(&tx, &agent.da_code)?;
        let mirror = RoleAgent {
            role_agent_id: existing
                .as_ref()
                .map(|m| m.role_agent_id.clone())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            external_da_code: agent.da_code.clone(),
            full_name: agent.full_name.clone(),
            phone: agent.phone.clone(),
            zone: agent.zone,
            status: role_status(agent.status).to_string(),
            compliance_score: agent.compliance_score,
            last_event_id: Some(envelope.event_id.clone()),
            synced_at: now,
        };
        let before = existing.as_ref();
        changes.record("role_agent", "full_name", before.map(|m| m.full_name.clone()), Some(mirror.full_name.clone()));
        changes.record("role_agent", "phone", before.map(|m| m.phone.clone()), Some(mirror.phone.clone()));
        changes.record("role_agent", "zone", before.map(|m| m.zone.to_string()), Some(mirror.zone.to_string()));
        changes.record("role_agent", "status", before.map(|m| m.status.clone()), Some(mirror.status.clone()));
        changes.record(
            "role_agent",
            "compliance_score",
            before.map(|m| m.compliance_score.to_string()),
            Some(mirror.compliance_score.to_string()),
        );
        let created = RoleAgentRepository::upsert_tx(&tx, &mirror)?;

        // ===== bin =====
        let mut zone_moved_from = None;
        match BinRepository::find_by_da_code_tx(&tx, &agent.da_code)? {
            None if agent.status.can_hold_stock() => {
                let bin = Bin {
                    bin_id: uuid::Uuid::new_v4().to_string(),
                    external_da_code: agent.da_code.clone(),
                    zone: agent.zone,
                    capacity_units: default_capacity,
                    current_stock_units: 0,
                    current_stock_value: 0.0,
                    status: BinStatus::Active,
                    suspension_reason: None,
                    suspended_at: None,
                    updated_at: now,
                };
                BinRepository::insert_tx(&tx, &bin)?;
                changes.record("bin", "status", None, Some(BinStatus::Active.to_string()));
                tracing::info!(da_code = %agent.da_code, bin_id = %bin.bin_id, capacity = default_capacity, "bin created");
            }
            None => {}
            Some(bin) => {
                if bin.zone != agent.zone {
                    BinRepository::update_zone_tx(&tx, &bin.bin_id, agent.zone, now)?;
                    changes.record("bin", "zone", Some(bin.zone.to_string()), Some(agent.zone.to_string()));
                    zone_moved_from = Some(bin.zone);
                }
                match bin_transition(&bin, agent.status) {
                    BinTransition::Keep => {}
                    BinTransition::Suspend { reason } => {
                        BinRepository::update_status_tx(&tx, &bin.bin_id, BinStatus::Suspended, Some(&reason), now)?;
                        changes.record("bin", "status", Some(bin.status.to_string()), Some(BinStatus::Suspended.to_string()));
                        changes.record("bin", "suspension_reason", bin.suspension_reason.clone(), Some(reason));
                    }
                    BinTransition::Reactivate => {
                        BinRepository::update_status_tx(&tx, &bin.bin_id, BinStatus::Active, None, now)?;
                        changes.record("bin", "status", Some(bin.status.to_string()), Some(BinStatus::Active.to_string()));
                    }
                }
            }
        }

        if let Some(from) = zone_moved_from {
            let message = templates::render(
                templates::AGENT_ZONE_CHANGED,
                locale,
                &[
                    ("da_code", agent.da_code.as_str()),
                    ("from", from.as_str()),
                    ("to", agent.zone.as_str()),
                ],
            );
            let notification = Notification::ops_alert(templates::AGENT_ZONE_CHANGED, Severity::Info, message)
                .with_event(&envelope.event_id);
            NotificationRepository::insert_tx(&tx, &notification)?;
        }

        let log = ActionLog::new(ActionType::RoleAgentSynced, LISTENER_NAME)
            .with_event(&envelope.event_id)
            .with_da_code(&agent.da_code)
            .with_payload(&changed_fields)
            .with_changes(&changes);
        ActionLogRepository::insert_tx(&tx, &log)?;

        ProcessedEventRepository::mark_processed_tx(&tx, &envelope.event_id, LISTENER_NAME, now)?;
        tx.commit()?;

        tracing::info!(
            event_id = %envelope.event_id,
            da_code = %agent.da_code,
            mirror_created = created,
            changes = %changes.summary_text(),
            "agent synced to role system"
        );
        Ok(())
    }
}

#[async_trait]
impl EventListener for SyncAgentToRoleSystem {
    fn name(&self) -> &str {
        LISTENER_NAME
    }

    fn subscribes_to(&self) -> EventKind {
        EventKind::AgentUpdated
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(3, vec![10, 30, 60])
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), ListenerError> {
        let DomainEvent::AgentUpdated {
            agent_id,
            changed_fields,
            ..
        } = &envelope.event
        else {
            return Err(ListenerError::Permanent(format!(
                "{} cannot handle {}",
                LISTENER_NAME,
                envelope.kind()
            )));
        };

        let default_capacity = self.config.get_default_bin_capacity().await?;
        let locale = self.config.get_notification_locale().await?;

        self.apply(envelope, agent_id, changed_fields, default_capacity, &locale)
    }

    async fn failed(&self, envelope: &EventEnvelope, error: &ListenerError) -> Result<(), ListenerError> {
        record_failure(&self.conn, LISTENER_NAME, envelope, AuditFlagType::AgentSyncFailed, error).map(|_| ())
    }
}
