// ==========================================
// VitalVida Sync Pipeline - stock API
// ==========================================
// allocate stock to a DA; the bin side is updated by
// SyncStockToBinSystem from the StockAllocated event
// ==========================================

use std::sync::Arc;

use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator::{normalize_da_code, Validator};
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::allocation::{compute_stock_value, total_units, AllocationItem, StockAllocation};
use crate::events::{DomainEvent, EventEnvelope, OptionalEventPublisher};
use crate::repository::{ActionLogRepository, AgentRepository, AllocationRepository};

const EVENT_SOURCE: &str = "stock_api";

pub struct StockApi {
    agent_repo: Arc<AgentRepository>,
    allocation_repo: Arc<AllocationRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    publisher: OptionalEventPublisher,
}

impl StockApi {
    pub fn new(
        agent_repo: Arc<AgentRepository>,
        allocation_repo: Arc<AllocationRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            agent_repo,
            allocation_repo,
            action_log_repo,
            publisher,
        }
    }

    pub fn allocate(
        &self,
        da_code: &str,
        items: Vec<AllocationItem>,
        allocated_by: &str,
    ) -> ApiResult<StockAllocation> {
        let da_code = normalize_da_code(da_code);

        let mut v = Validator::new();
        v.require_non_empty("allocated_by", allocated_by);
        v.check(!items.is_empty(), "items", "at least one item is required");
        for (i, item) in items.iter().enumerate() {
            v.require_non_empty(&format!("items[{}].product_code", i), &item.product_code);
            v.check(item.quantity > 0, &format!("items[{}].quantity", i), "must be greater than 0");
            v.check(
                item.unit_price.is_finite() && item.unit_price >= 0.0,
                &format!("items[{}].unit_price", i),
                "must not be negative",
            );
        }
        let units = total_units(&items);
        v.check(units.is_some(), "items", "total quantity is too large");
        v.finish()?;
        let units = units.ok_or_else(|| ApiError::InternalError("unit total passed validation without a value".into()))?;

        let agent = self
            .agent_repo
            .find_by_da_code(&da_code)?
            .ok_or_else(|| ApiError::NotFound(format!("DeliveryAgent (da_code={})", da_code)))?;
        if !agent.status.can_hold_stock() {
            return Err(ApiError::BusinessRuleViolation(format!(
                "{} is {} and cannot receive stock",
                da_code, agent.status
            )));
        }

        let allocation = StockAllocation {
            allocation_id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent.agent_id.clone(),
            da_code: da_code.clone(),
            stock_value: compute_stock_value(&items),
            total_units: units,
            items,
            allocated_by: allocated_by.trim().to_string(),
            allocated_at: now_ts(),
        };
        self.allocation_repo.insert(&allocation)?;

        let envelope = EventEnvelope::new(
            DomainEvent::StockAllocated {
                allocation_id: allocation.allocation_id.clone(),
                agent_id: allocation.agent_id.clone(),
                da_code: allocation.da_code.clone(),
                items: allocation.items.clone(),
                stock_value: allocation.stock_value,
            },
            EVENT_SOURCE,
        );
        let event_id = envelope.event_id.clone();
        if let Err(e) = self.publisher.publish(envelope) {
            warn!(%da_code, allocation_id = %allocation.allocation_id, error = %e, "publish failed, allocation undone");
            self.allocation_repo.delete(&allocation.allocation_id)?;
            return Err(e.into());
        }

        let log = ActionLog::new(ActionType::StockAllocated, &allocation.allocated_by)
            .with_event(&event_id)
            .with_da_code(&da_code)
            .with_payload(&allocation)
            .with_detail(format!(
                "{} units, NGN {:.2}",
                allocation.total_units, allocation.stock_value
            ));
        self.action_log_repo.insert(&log)?;

        info!(
            %da_code,
            allocation_id = %allocation.allocation_id,
            units = allocation.total_units,
            stock_value = allocation.stock_value,
            %event_id,
            "stock allocated"
        );
        Ok(allocation)
    }

    pub fn get_allocation(&self, allocation_id: &str) -> ApiResult<StockAllocation> {
        self.allocation_repo
            .find_by_id(allocation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("StockAllocation (id={})", allocation_id)))
    }

    /// Newest first
    pub fn list_allocations(&self, da_code: &str, limit: i64) -> ApiResult<Vec<StockAllocation>> {
        let ids = self
            .allocation_repo
            .list_ids_by_da_code(&normalize_da_code(da_code), limit)?;
        let mut allocations = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(allocation) = self.allocation_repo.find_by_id(&id)? {
                allocations.push(allocation);
            }
        }
        Ok(allocations)
    }
}
