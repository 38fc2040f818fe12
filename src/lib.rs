// ==========================================
// VitalVida Sync Pipeline - core library
// ==========================================
// Admin writes publish domain events; queued listeners keep
// the role (bin) system and the compliance state in sync.
// Stack: Rust + SQLite + tokio
// ==========================================

rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// modules
// ==========================================

// entities and value types
pub mod domain;

// data access
pub mod repository;

// pure business rules
pub mod engine;

// domain events and publishing
pub mod events;

// persistent job queue and worker
pub mod queue;

// event listeners
pub mod listeners;

// outbound notifications
pub mod notify;

// roster import
pub mod importer;

// runtime configuration
pub mod config;

// connection setup, migrations, timestamp helpers
pub mod db;

pub mod logging;

pub mod i18n;

// validated entry points
pub mod api;

// object graph for the worker binary
pub mod app;

// ==========================================
// re-exports
// ==========================================

pub use domain::types::{AgentStatus, BinStatus, ComplianceActionType, Severity};
pub use domain::{
    ActionLog, ActionType, AuditFlag, Bin, ComplianceAction, DeliveryAgent, EscalationRequest,
    RoleAgent, SalaryDeduction, StockAllocation, Zone,
};
pub use events::{DomainEvent, EventEnvelope, EventKind};
pub use queue::{JobOutcome, JobQueue, QueueWorker, RetryPolicy};
pub use api::{AgentApi, ComplianceApi, EscalationApi, QueueApi, StockApi};

// ==========================================
// constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "VitalVida Sync Pipeline";

pub const DB_VERSION: &str = "v0.1";
