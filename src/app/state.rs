// ==========================================
// VitalVida Sync Pipeline - application state
// ==========================================
// Wires one shared SQLite connection through repositories,
// listeners, queue, publisher, APIs and background loops.
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;

use crate::api::{AgentApi, ComplianceApi, EscalationApi, QueueApi, StockApi};
use crate::config::{ConfigManager, PipelineConfigReader};
use crate::db::{apply_migrations, open_sqlite_connection};
use crate::engine::zone_resolver::ZoneResolver;
use crate::events::{OptionalEventPublisher, QueueEventDispatcher};
use crate::importer::RosterImporter;
use crate::listeners::{
    EventListener, HandleComplianceAction, ListenerRegistry, SyncAgentToRoleSystem,
    SyncStockToBinSystem,
};
use crate::notify::{LogChannel, NotificationChannel, NotificationDispatcher};
use crate::queue::{JobQueue, QueueWorker};
use crate::repository::{
    ActionLogRepository, AgentRepository, AllocationRepository, AuditFlagRepository,
    ComplianceActionRepository, ComplianceRecordRepository, EscalationRepository,
    NotificationRepository,
};

/// Default interval between queue polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

pub struct AppState {
    db_path: String,
    pub conn: Arc<Mutex<Connection>>,
    pub config_manager: Arc<ConfigManager>,

    pub agent_api: Arc<AgentApi>,
    pub stock_api: Arc<StockApi>,
    pub compliance_api: Arc<ComplianceApi>,
    pub escalation_api: Arc<EscalationApi>,
    pub queue_api: Arc<QueueApi>,
    pub roster_importer: Arc<RosterImporter>,

    pub registry: Arc<ListenerRegistry>,
    pub queue: Arc<JobQueue>,
    pub worker: Arc<QueueWorker>,
    pub notification_dispatcher: Arc<NotificationDispatcher>,
    pub event_publisher: OptionalEventPublisher,
}

impl AppState {
    pub fn new(db_path: String) -> anyhow::Result<Self> {
        Self::with_poll_interval(db_path, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(db_path: String, poll_interval: Duration) -> anyhow::Result<Self> {
        tracing::info!(%db_path, "initializing AppState");

        let conn = open_sqlite_connection(&db_path)
            .with_context(|| format!("cannot open database {}", db_path))?;
        apply_migrations(&conn).context("schema migration failed")?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // repositories / config
        // ==========================================
        let agent_repo = Arc::new(AgentRepository::new(conn.clone()));
        let allocation_repo = Arc::new(AllocationRepository::new(conn.clone()));
        let compliance_action_repo = Arc::new(ComplianceActionRepository::new(conn.clone()));
        let compliance_record_repo = Arc::new(ComplianceRecordRepository::new(conn.clone()));
        let flag_repo = Arc::new(AuditFlagRepository::new(conn.clone()));
        let escalation_repo = Arc::new(EscalationRepository::new(conn.clone()));
        let notification_repo = Arc::new(NotificationRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone()).context("cannot create ConfigManager")?,
        );
        let config_reader: Arc<dyn PipelineConfigReader> = config_manager.clone();

        let zone_overrides = config_manager
            .get_zone_keyword_overrides()
            .context("cannot read zone keyword overrides")?;
        let zone_resolver = Arc::new(ZoneResolver::with_overrides(&zone_overrides));

        // ==========================================
        // listeners / queue
        // ==========================================
        let listeners: Vec<Arc<dyn EventListener>> = vec![
            Arc::new(SyncAgentToRoleSystem::new(conn.clone(), config_reader.clone())),
            Arc::new(SyncStockToBinSystem::new(conn.clone(), config_reader.clone())),
            Arc::new(HandleComplianceAction::new(conn.clone(), config_reader.clone())),
        ];

        let mut registry = ListenerRegistry::new();
        for listener in listeners {
            let name = listener.name().to_string();
            let declared = listener.retry_policy();
            registry.register(listener);
            if let Some(policy) = config_manager
                .get_retry_policy_override(&name, &declared)
                .with_context(|| format!("invalid retry override for {}", name))?
            {
                tracing::info!(
                    listener = %name,
                    max_attempts = policy.max_attempts,
                    backoff = ?policy.backoff_seconds,
                    "retry policy overridden by config"
                );
                registry.override_policy(&name, policy);
            }
        }
        let registry = Arc::new(registry);

        let queue = Arc::new(JobQueue::new(conn.clone()));
        let event_publisher = OptionalEventPublisher::with_publisher(Arc::new(
            QueueEventDispatcher::new(queue.clone(), registry.clone()),
        ));

        let stale_seconds = config_manager
            .get_stale_running_seconds()
            .context("cannot read queue.stale_running_seconds")?;
        let worker = Arc::new(QueueWorker::new(
            queue.clone(),
            registry.clone(),
            poll_interval,
            chrono::Duration::seconds(stale_seconds),
        ));

        let channels: Vec<Arc<dyn NotificationChannel>> = vec![Arc::new(LogChannel)];
        let notification_dispatcher =
            Arc::new(NotificationDispatcher::new(notification_repo, channels));

        // ==========================================
        // APIs
        // ==========================================
        let agent_api = Arc::new(AgentApi::new(
            agent_repo.clone(),
            action_log_repo.clone(),
            zone_resolver,
            config_reader,
            event_publisher.clone(),
        ));
        let stock_api = Arc::new(StockApi::new(
            agent_repo.clone(),
            allocation_repo,
            action_log_repo.clone(),
            event_publisher.clone(),
        ));
        let compliance_api = Arc::new(ComplianceApi::new(
            agent_repo,
            compliance_action_repo,
            compliance_record_repo,
            flag_repo,
            action_log_repo.clone(),
            event_publisher.clone(),
        ));
        let escalation_api = Arc::new(EscalationApi::new(conn.clone(), escalation_repo));
        let queue_api = Arc::new(QueueApi::new(queue.clone(), action_log_repo));
        let roster_importer = Arc::new(RosterImporter::new(agent_api.clone()));

        tracing::info!(listeners = ?registry.names(), "AppState initialized");

        Ok(Self {
            db_path,
            conn,
            config_manager,
            agent_api,
            stock_api,
            compliance_api,
            escalation_api,
            queue_api,
            roster_importer,
            registry,
            queue,
            worker,
            notification_dispatcher,
            event_publisher,
        })
    }

    pub fn get_db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// default database path
// ==========================================

/// `VITALVIDA_DB_PATH` if set, else `<data_dir>/vitalvida-sync/vitalvida_sync.db`
/// (`vitalvida-sync-dev` in debug builds), else `./vitalvida_sync.db`
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("VITALVIDA_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./vitalvida_sync.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("vitalvida-sync-dev");
        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("vitalvida-sync");

        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("vitalvida_sync.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_wires_three_listeners() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.get_db_path(), db_path);
        assert_eq!(state.registry.len(), 3);
        assert!(state.event_publisher.is_configured());
        assert_eq!(state.queue_api.stats().unwrap().pending_count, 0);
    }

    #[test]
    fn test_app_state_applies_retry_override() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("override.db").to_string_lossy().to_string();

        {
            let conn = open_sqlite_connection(&db_path).unwrap();
            apply_migrations(&conn).unwrap();
            let config = ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap();
            config
                .set_global_config_value("queue.max_attempts.sync_stock_to_bin_system", "7")
                .unwrap();
        }

        let state = AppState::new(db_path).unwrap();
        let policy = state.registry.policy_for("sync_stock_to_bin_system");
        assert_eq!(policy.max_attempts, 7);
        assert_eq!(policy.backoff_seconds, vec![5, 15, 30, 60, 120]);
    }
}
