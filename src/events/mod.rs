// ==========================================
// VitalVida Sync Pipeline - domain events
// ==========================================
// Responsibility: event payloads raised by the VitalVida side
//                 and the publisher seam the APIs call
// Flow: API -> EventPublisher -> queued job per listener
// ==========================================

pub mod dispatcher;
pub mod publisher;

use crate::domain::allocation::AllocationItem;
use crate::domain::types::ComplianceActionType;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use dispatcher::QueueEventDispatcher;
pub use publisher::{EventPublisher, NoOpEventPublisher, OptionalEventPublisher, PublishError};

// ==========================================
// EventKind
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AgentUpdated,
    StockAllocated,
    ComplianceAction,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AgentUpdated => "AgentUpdated",
            EventKind::StockAllocated => "StockAllocated",
            EventKind::ComplianceAction => "ComplianceAction",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// DomainEvent
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    AgentUpdated {
        agent_id: String,
        da_code: String,
        /// Empty for a newly registered agent
        changed_fields: Vec<String>,
    },
    StockAllocated {
        allocation_id: String,
        agent_id: String,
        da_code: String,
        items: Vec<AllocationItem>,
        stock_value: f64,
    },
    ComplianceAction {
        action_id: String,
        da_code: String,
        action_type: ComplianceActionType,
        reason: String,
        initiated_by: String,
        amount: Option<f64>,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::AgentUpdated { .. } => EventKind::AgentUpdated,
            DomainEvent::StockAllocated { .. } => EventKind::StockAllocated,
            DomainEvent::ComplianceAction { .. } => EventKind::ComplianceAction,
        }
    }

    pub fn da_code(&self) -> &str {
        match self {
            DomainEvent::AgentUpdated { da_code, .. }
            | DomainEvent::StockAllocated { da_code, .. }
            | DomainEvent::ComplianceAction { da_code, .. } => da_code,
        }
    }
}

// ==========================================
// EventEnvelope - what gets serialized into a queued job
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: String,
    pub occurred_at: NaiveDateTime,
    /// Who raised it: "agent_api", "roster_import", ...
    pub source: String,
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent, source: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            occurred_at: crate::db::now_ts(),
            source: source.to_string(),
            event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}
