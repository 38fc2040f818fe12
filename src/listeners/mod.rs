// ==========================================
// VitalVida Sync Pipeline - event listeners
// ==========================================
// AgentUpdated      -> SyncAgentToRoleSystem
// StockAllocated    -> SyncStockToBinSystem
// ComplianceAction  -> HandleComplianceAction
// Every listener is idempotent per (event_id, listener):
// the processed_events marker commits with the mutation.
// ==========================================

pub mod compliance_action;
pub mod sync_agent;
pub mod sync_stock;

pub use compliance_action::HandleComplianceAction;
pub use sync_agent::SyncAgentToRoleSystem;
pub use sync_stock::SyncStockToBinSystem;

use crate::config::ConfigError;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::audit_flag::{AuditFlag, AuditFlagType};
use crate::domain::types::Severity;
use crate::events::{EventEnvelope, EventKind};
use crate::queue::RetryPolicy;
use crate::repository::{ActionLogRepository, AuditFlagRepository, RepositoryError};
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

// ==========================================
// ListenerError
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// Transient; the worker retries while attempts remain
    #[error("retryable: {0}")]
    Retryable(String),

    /// Retrying cannot help; the job goes straight to failed()
    #[error("permanent: {0}")]
    Permanent(String),
}

impl ListenerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ListenerError::Retryable(_))
    }
}

impl From<RepositoryError> for ListenerError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. }
            | RepositoryError::ValidationError(_)
            | RepositoryError::BusinessRuleViolation(_)
            | RepositoryError::FieldValueError { .. } => ListenerError::Permanent(err.to_string()),
            other => ListenerError::Retryable(other.to_string()),
        }
    }
}

impl From<ConfigError> for ListenerError {
    fn from(err: ConfigError) -> Self {
        ListenerError::Retryable(err.to_string())
    }
}

impl From<rusqlite::Error> for ListenerError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

// ==========================================
// EventListener
// ==========================================
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Stable name stored on queued jobs and processed_events
    fn name(&self) -> &str;

    fn subscribes_to(&self) -> EventKind;

    /// Declared attempts and backoff
    fn retry_policy(&self) -> RetryPolicy;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), ListenerError>;

    /// Runs once after the last attempt failed
    async fn failed(&self, envelope: &EventEnvelope, error: &ListenerError) -> Result<(), ListenerError>;
}

/// Lock the shared connection for one listener transaction
pub(crate) fn lock_conn(conn: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, ListenerError> {
    conn.lock()
        .map_err(|e| ListenerError::Retryable(format!("connection lock poisoned: {}", e)))
}

/// failed() body shared by all listeners: one open flag plus an action log row
pub(crate) fn record_failure(
    conn: &Mutex<Connection>,
    listener: &str,
    envelope: &EventEnvelope,
    flag_type: AuditFlagType,
    error: &ListenerError,
) -> Result<String, ListenerError> {
    let da_code = envelope.event.da_code();
    let flag = AuditFlag::new(flag_type, Severity::Warning, listener)
        .for_agent(da_code)
        .with_event(&envelope.event_id)
        .with_details(serde_json::json!({
            "event_type": envelope.kind().as_str(),
            "error": error.to_string(),
        }));
    let log = ActionLog::new(ActionType::ListenerFailed, listener)
        .with_event(&envelope.event_id)
        .with_da_code(da_code)
        .with_detail(error.to_string());

    let mut guard = lock_conn(conn)?;
    let tx = guard.transaction()?;
    let flag_id = AuditFlagRepository::insert_tx(&tx, &flag)?;
    ActionLogRepository::insert_tx(&tx, &log)?;
    tx.commit()?;

    tracing::error!(
        listener,
        event_id = %envelope.event_id,
        da_code,
        %flag_id,
        flag_type = flag_type.as_str(),
        error = %error,
        "listener gave up, audit flag raised"
    );
    Ok(flag_id)
}

// ==========================================
// ListenerRegistry
// ==========================================
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: Vec<Arc<dyn EventListener>>,
    policy_overrides: HashMap<String, RetryPolicy>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; a second registration under the same name replaces the first
    pub fn register(&mut self, listener: Arc<dyn EventListener>) {
        if let Some(existing) = self
            .listeners
            .iter_mut()
            .find(|l| l.name() == listener.name())
        {
            tracing::warn!(listener = listener.name(), "listener registered twice, replacing");
            *existing = listener;
            return;
        }
        tracing::debug!(
            listener = listener.name(),
            event = %listener.subscribes_to(),
            "listener registered"
        );
        self.listeners.push(listener);
    }

    /// Replace a listener's declared retry policy (from config)
    pub fn override_policy(&mut self, name: &str, policy: RetryPolicy) {
        self.policy_overrides.insert(name.to_string(), policy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EventListener>> {
        self.listeners.iter().find(|l| l.name() == name).cloned()
    }

    /// Effective retry policy: override if configured, else declared
    pub fn policy_for(&self, name: &str) -> RetryPolicy {
        if let Some(policy) = self.policy_overrides.get(name) {
            return policy.clone();
        }
        self.get(name)
            .map(|l| l.retry_policy())
            .unwrap_or_else(RetryPolicy::once)
    }

    /// Listeners for an event kind, in registration order
    pub fn subscribers_for(&self, kind: EventKind) -> Vec<Arc<dyn EventListener>> {
        self.listeners
            .iter()
            .filter(|l| l.subscribes_to() == kind)
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.listeners.iter().map(|l| l.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
