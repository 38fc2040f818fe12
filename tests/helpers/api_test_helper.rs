// ==========================================
// Pipeline test environment
// ==========================================
// Temp database + full object graph with a mock config.
// Jobs run only when a test calls `drain()`.
// ==========================================

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::Connection;
use tempfile::TempDir;

use vitalvida_sync::api::{
    AgentApi, ComplianceApi, EscalationApi, QueueApi, RecordActionRequest, RegisterAgentRequest,
    StockApi,
};
use vitalvida_sync::config::PipelineConfigReader;
use vitalvida_sync::db::{apply_migrations, now_ts, open_sqlite_connection};
use vitalvida_sync::domain::allocation::AllocationItem;
use vitalvida_sync::domain::types::ComplianceActionType;
use vitalvida_sync::domain::{ComplianceAction, DeliveryAgent, StockAllocation};
use vitalvida_sync::engine::zone_resolver::ZoneResolver;
use vitalvida_sync::events::{OptionalEventPublisher, QueueEventDispatcher};
use vitalvida_sync::importer::RosterImporter;
use vitalvida_sync::listeners::{
    EventListener, HandleComplianceAction, ListenerRegistry, SyncAgentToRoleSystem,
    SyncStockToBinSystem,
};
use vitalvida_sync::queue::{JobOutcome, JobQueue, QueueWorker};
use vitalvida_sync::repository::{
    ActionLogRepository, AgentRepository, AllocationRepository, AuditFlagRepository,
    BinRepository, ComplianceActionRepository, ComplianceRecordRepository, DeductionRepository,
    EscalationRepository, NotificationRepository, RoleAgentRepository,
};

use super::mock_config::MockConfig;

pub struct PipelineTestEnv {
    _dir: TempDir,
    pub db_path: String,
    pub conn: Arc<Mutex<Connection>>,

    pub agent_api: Arc<AgentApi>,
    pub stock_api: StockApi,
    pub compliance_api: ComplianceApi,
    pub escalation_api: EscalationApi,
    pub queue_api: QueueApi,
    pub importer: RosterImporter,

    pub queue: Arc<JobQueue>,
    pub worker: QueueWorker,

    pub agent_repo: Arc<AgentRepository>,
    pub role_agent_repo: RoleAgentRepository,
    pub bin_repo: BinRepository,
    pub flag_repo: Arc<AuditFlagRepository>,
    pub deduction_repo: DeductionRepository,
    pub notification_repo: NotificationRepository,
    pub record_repo: Arc<ComplianceRecordRepository>,
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl PipelineTestEnv {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self::build(config, |_| {})
    }

    /// Build with a hook to adjust the registry (e.g. override retry policies)
    pub fn build(config: MockConfig, tune: impl FnOnce(&mut ListenerRegistry)) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("pipeline.db").to_string_lossy().to_string();

        let conn = open_sqlite_connection(&db_path).expect("open db");
        apply_migrations(&conn).expect("migrations");
        let conn = Arc::new(Mutex::new(conn));

        let config: Arc<dyn PipelineConfigReader> = Arc::new(config);

        let agent_repo = Arc::new(AgentRepository::new(conn.clone()));
        let allocation_repo = Arc::new(AllocationRepository::new(conn.clone()));
        let action_repo = Arc::new(ComplianceActionRepository::new(conn.clone()));
        let record_repo = Arc::new(ComplianceRecordRepository::new(conn.clone()));
        let flag_repo = Arc::new(AuditFlagRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let listeners: Vec<Arc<dyn EventListener>> = vec![
            Arc::new(SyncAgentToRoleSystem::new(conn.clone(), config.clone())),
            Arc::new(SyncStockToBinSystem::new(conn.clone(), config.clone())),
            Arc::new(HandleComplianceAction::new(conn.clone(), config.clone())),
        ];
        let mut registry = ListenerRegistry::new();
        for listener in listeners {
            registry.register(listener);
        }
        tune(&mut registry);
        let registry = Arc::new(registry);

        let queue = Arc::new(JobQueue::new(conn.clone()));
        let publisher = OptionalEventPublisher::with_publisher(Arc::new(
            QueueEventDispatcher::new(queue.clone(), registry.clone()),
        ));
        let worker = QueueWorker::new(
            queue.clone(),
            registry,
            Duration::from_millis(10),
            chrono::Duration::seconds(300),
        );

        let agent_api = Arc::new(AgentApi::new(
            agent_repo.clone(),
            action_log_repo.clone(),
            Arc::new(ZoneResolver::new()),
            config,
            publisher.clone(),
        ));
        let stock_api = StockApi::new(
            agent_repo.clone(),
            allocation_repo,
            action_log_repo.clone(),
            publisher.clone(),
        );
        let compliance_api = ComplianceApi::new(
            agent_repo.clone(),
            action_repo,
            record_repo.clone(),
            flag_repo.clone(),
            action_log_repo.clone(),
            publisher,
        );
        let escalation_api = EscalationApi::new(
            conn.clone(),
            Arc::new(EscalationRepository::new(conn.clone())),
        );
        let queue_api = QueueApi::new(queue.clone(), action_log_repo.clone());
        let importer = RosterImporter::new(agent_api.clone());

        Self {
            _dir: dir,
            db_path,
            agent_api,
            stock_api,
            compliance_api,
            escalation_api,
            queue_api,
            importer,
            queue,
            worker,
            agent_repo,
            role_agent_repo: RoleAgentRepository::new(conn.clone()),
            bin_repo: BinRepository::new(conn.clone()),
            flag_repo,
            deduction_repo: DeductionRepository::new(conn.clone()),
            notification_repo: NotificationRepository::new(conn.clone()),
            record_repo,
            action_log_repo,
            conn,
        }
    }

    /// Run every job due now
    pub async fn drain(&self) -> Vec<JobOutcome> {
        self.worker.process_all().await.expect("worker tick")
    }

    /// Run every job due at `now`
    pub async fn drain_at(&self, now: NaiveDateTime) -> Vec<JobOutcome> {
        self.worker.process_all_at(now).await.expect("worker tick")
    }

    /// Register a DA and let the agent sync run
    pub async fn onboard(&self, da_code: &str, location: &str) -> DeliveryAgent {
        let agent = self
            .agent_api
            .register_agent(
                RegisterAgentRequest {
                    da_code: da_code.to_string(),
                    full_name: format!("Agent {}", da_code),
                    phone: "0803 123 4567".to_string(),
                    location: location.to_string(),
                    rating: 4.0,
                },
                "admin",
            )
            .await
            .expect("register agent");
        self.drain().await;
        agent
    }

    pub fn allocate(&self, da_code: &str, quantity: i64, unit_price: f64) -> StockAllocation {
        self.stock_api
            .allocate(
                da_code,
                vec![AllocationItem {
                    product_code: "VV-SHAMPOO".to_string(),
                    quantity,
                    unit_price,
                }],
                "inventory_manager",
            )
            .expect("allocate stock")
    }

    pub fn record(
        &self,
        da_code: &str,
        action_type: ComplianceActionType,
        amount: Option<f64>,
    ) -> ComplianceAction {
        self.compliance_api
            .record_action(RecordActionRequest {
                da_code: da_code.to_string(),
                action_type,
                reason: format!("{} recorded in test", action_type),
                initiated_by: "compliance_officer".to_string(),
                amount,
            })
            .expect("record compliance action")
    }

    pub fn now(&self) -> NaiveDateTime {
        now_ts()
    }
}
