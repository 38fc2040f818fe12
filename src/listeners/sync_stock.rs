// ==========================================
// VitalVida Sync Pipeline - SyncStockToBinSystem
// ==========================================
// StockAllocated -> bin movement (keyed by allocation_id)
// value mismatch   : flag + permanent failure
// no bin yet       : retryable (agent sync may lag)
// bin not ACTIVE   : flag + critical alert, not applied
// over capacity    : applied, flag + critical alert
// near capacity    : applied, warning alert
// Retry: 5 attempts, backoff 5s / 15s / 30s / 60s / 120s
// ==========================================

use crate::config::PipelineConfigReader;
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType, ChangeSet};
use crate::domain::allocation::{compute_stock_value, stock_value_matches, total_units, AllocationItem};
use crate::domain::audit_flag::{AuditFlag, AuditFlagType};
use crate::domain::notification::Notification;
use crate::domain::types::Severity;
use crate::engine::bin_capacity::{BinCapacity, CapacityCheck};
use crate::events::{DomainEvent, EventEnvelope, EventKind};
use crate::listeners::{lock_conn, record_failure, EventListener, ListenerError};
use crate::notify::templates;
use crate::queue::RetryPolicy;
use crate::repository::{
    ActionLogRepository, AuditFlagRepository, BinRepository, NotificationRepository,
    ProcessedEventRepository,
};
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub const LISTENER_NAME: &str = "sync_stock_to_bin_system";

pub struct SyncStockToBinSystem {
    conn: Arc<Mutex<Connection>>,
    config: Arc<dyn PipelineConfigReader>,
}

struct Allocation<'a> {
    allocation_id: &'a str,
    da_code: &'a str,
    items: &'a [AllocationItem],
    stock_value: f64,
}

impl SyncStockToBinSystem {
    pub fn new(conn: Arc<Mutex<Connection>>, config: Arc<dyn PipelineConfigReader>) -> Self {
        Self { conn, config }
    }

    fn apply(
        &self,
        envelope: &EventEnvelope,
        alloc: Allocation<'_>,
        capacity: BinCapacity,
        locale: &str,
    ) -> Result<(), ListenerError> {
        let now = now_ts();
        let mut guard = lock_conn(&self.conn)?;
        let tx = guard.transaction()?;

        if ProcessedEventRepository::is_processed_tx(&tx, &envelope.event_id, LISTENER_NAME)? {
            tracing::debug!(event_id = %envelope.event_id, "allocation event already applied");
            return Ok(());
        }

        if !stock_value_matches(alloc.items, alloc.stock_value) {
            let computed = compute_stock_value(alloc.items);
            let flag = AuditFlag::new(AuditFlagType::StockValueMismatch, Severity::Critical, LISTENER_NAME)
                .for_agent(alloc.da_code)
                .with_event(&envelope.event_id)
                .with_details(serde_json::json!({
                    "allocation_id": alloc.allocation_id,
                    "declared": alloc.stock_value,
                    "computed": computed,
                }));
            AuditFlagRepository::insert_tx(&tx, &flag)?;
            tx.commit()?;
            return Err(ListenerError::Permanent(format!(
                "allocation {} declares stock value {:.2} but items total {:.2}",
                alloc.allocation_id, alloc.stock_value, computed
            )));
        }

        let units = total_units(alloc.items).ok_or_else(|| {
            ListenerError::Permanent(format!("allocation {} unit count overflows", alloc.allocation_id))
        })?;
        let bin = BinRepository::find_by_da_code_tx(&tx, alloc.da_code)?.ok_or_else(|| {
            ListenerError::Retryable(format!("no bin for {} yet", alloc.da_code))
        })?;

        // ===== bin not accepting stock =====
        if !bin.status.accepts_stock() {
            let flag = AuditFlag::new(AuditFlagType::AllocationToSuspendedBin, Severity::Critical, LISTENER_NAME)
                .for_agent(alloc.da_code)
                .with_event(&envelope.event_id)
                .with_details(serde_json::json!({
                    "allocation_id": alloc.allocation_id,
                    "bin_id": bin.bin_id,
                    "bin_status": bin.status.as_str(),
                    "suspension_reason": bin.suspension_reason,
                    "units": units,
                    "stock_value": alloc.stock_value,
                }));
            AuditFlagRepository::insert_tx(&tx, &flag)?;

            let message = templates::render(
                templates::BIN_ALLOCATION_BLOCKED,
                locale,
                &[
                    ("allocation_id", alloc.allocation_id),
                    ("da_code", alloc.da_code),
                    ("status", bin.status.as_str()),
                ],
            );
            let alert = Notification::ops_alert(templates::BIN_ALLOCATION_BLOCKED, Severity::Critical, message)
                .with_event(&envelope.event_id);
            NotificationRepository::insert_tx(&tx, &alert)?;

            let log = ActionLog::new(ActionType::AllocationRejected, LISTENER_NAME)
                .with_event(&envelope.event_id)
                .with_da_code(alloc.da_code)
                .with_detail(format!("bin {} is {}", bin.bin_id, bin.status));
            ActionLogRepository::insert_tx(&tx, &log)?;

            ProcessedEventRepository::mark_processed_tx(&tx, &envelope.event_id, LISTENER_NAME, now)?;
            tx.commit()?;

            tracing::warn!(
                event_id = %envelope.event_id,
                da_code = alloc.da_code,
                allocation_id = alloc.allocation_id,
                bin_status = bin.status.as_str(),
                "allocation to inactive bin blocked"
            );
            return Ok(());
        }

        // ===== apply =====
        let units_after = bin.current_stock_units.checked_add(units).ok_or_else(|| {
            ListenerError::Permanent(format!(
                "allocation {} would overflow the unit count of bin {}",
                alloc.allocation_id, bin.bin_id
            ))
        })?;
        let check = capacity.check(&bin, units);
        let applied = BinRepository::apply_movement_tx(
            &tx,
            &bin.bin_id,
            alloc.allocation_id,
            units,
            alloc.stock_value,
            now,
        )?;
        if !applied {
            // same allocation published under another event id
            tracing::info!(allocation_id = alloc.allocation_id, "allocation already on bin, skipped");
            ProcessedEventRepository::mark_processed_tx(&tx, &envelope.event_id, LISTENER_NAME, now)?;
            tx.commit()?;
            return Ok(());
        }

        let mut changes = ChangeSet::new();
        let value_after = ((bin.current_stock_value + alloc.stock_value) * 100.0).round() / 100.0;
        changes.record(
            "bin",
            "current_stock_units",
            Some(bin.current_stock_units.to_string()),
            Some(units_after.to_string()),
        );
        changes.record(
            "bin",
            "current_stock_value",
            Some(format!("{:.2}", bin.current_stock_value)),
            Some(format!("{:.2}", value_after)),
        );

        match check {
            CapacityCheck::Fits => {}
            CapacityCheck::NearCapacity { utilization } => {
                let percent = format!("{:.0}", utilization * 100.0);
                let message = templates::render(
                    templates::BIN_NEAR_CAPACITY,
                    locale,
                    &[("da_code", alloc.da_code), ("percent", percent.as_str())],
                );
                let alert = Notification::ops_alert(templates::BIN_NEAR_CAPACITY, Severity::Warning, message)
                    .with_event(&envelope.event_id);
                NotificationRepository::insert_tx(&tx, &alert)?;
            }
            CapacityCheck::OverCapacity { excess_units } => {
                let flag = AuditFlag::new(AuditFlagType::BinOverCapacity, Severity::Critical, LISTENER_NAME)
                    .for_agent(alloc.da_code)
                    .with_event(&envelope.event_id)
                    .with_details(serde_json::json!({
                        "allocation_id": alloc.allocation_id,
                        "bin_id": bin.bin_id,
                        "capacity_units": bin.capacity_units,
                        "stock_units_after": units_after,
                        "excess_units": excess_units,
                    }));
                AuditFlagRepository::insert_tx(&tx, &flag)?;

                let excess = excess_units.to_string();
                let message = templates::render(
                    templates::BIN_OVER_CAPACITY,
                    locale,
                    &[
                        ("da_code", alloc.da_code),
                        ("excess", excess.as_str()),
                        ("allocation_id", alloc.allocation_id),
                    ],
                );
                let alert = Notification::ops_alert(templates::BIN_OVER_CAPACITY, Severity::Critical, message)
                    .with_event(&envelope.event_id);
                NotificationRepository::insert_tx(&tx, &alert)?;
            }
        }

        let log = ActionLog::new(ActionType::StockApplied, LISTENER_NAME)
            .with_event(&envelope.event_id)
            .with_da_code(alloc.da_code)
            .with_payload(&serde_json::json!({
                "allocation_id": alloc.allocation_id,
                "units": units,
                "stock_value": alloc.stock_value,
            }))
            .with_changes(&changes);
        ActionLogRepository::insert_tx(&tx, &log)?;

        ProcessedEventRepository::mark_processed_tx(&tx, &envelope.event_id, LISTENER_NAME, now)?;
        tx.commit()?;

        tracing::info!(
            event_id = %envelope.event_id,
            da_code = alloc.da_code,
            allocation_id = alloc.allocation_id,
            units,
            check = ?check,
            "stock applied to bin"
        );
        Ok(())
    }
}

#[async_trait]
impl EventListener for SyncStockToBinSystem {
    fn name(&self) -> &str {
        LISTENER_NAME
    }

    fn subscribes_to(&self) -> EventKind {
        EventKind::StockAllocated
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(5, vec![5, 15, 30, 60, 120])
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), ListenerError> {
        let DomainEvent::StockAllocated {
            allocation_id,
            da_code,
            items,
            stock_value,
            ..
        } = &envelope.event
        else {
            return Err(ListenerError::Permanent(format!(
                "{} cannot handle {}",
                LISTENER_NAME,
                envelope.kind()
            )));
        };

        let capacity = BinCapacity::new(self.config.get_near_capacity_ratio().await?);
        let locale = self.config.get_notification_locale().await?;

        let alloc = Allocation {
            allocation_id,
            da_code,
            items,
            stock_value: *stock_value,
        };
        self.apply(envelope, alloc, capacity, &locale)
    }

    async fn failed(&self, envelope: &EventEnvelope, error: &ListenerError) -> Result<(), ListenerError> {
        record_failure(&self.conn, LISTENER_NAME, envelope, AuditFlagType::StockSyncFailed, error).map(|_| ())
    }
}
