// ==========================================
// Publish failure tests
// ==========================================
// A write whose event cannot be queued must not stay behind:
// the caller gets the error and can simply try again.
// ==========================================

mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use helpers::mock_config::MockConfig;
use vitalvida_sync::api::{
    AgentApi, ApiError, ComplianceApi, RecordActionRequest, RegisterAgentRequest, StockApi,
};
use vitalvida_sync::db::{apply_migrations, open_sqlite_connection};
use vitalvida_sync::domain::agent::AgentChanges;
use vitalvida_sync::domain::allocation::AllocationItem;
use vitalvida_sync::domain::types::ComplianceActionType;
use vitalvida_sync::engine::zone_resolver::ZoneResolver;
use vitalvida_sync::events::{EventEnvelope, EventPublisher, OptionalEventPublisher, PublishError};
use vitalvida_sync::repository::{
    ActionLogRepository, AgentRepository, AllocationRepository, AuditFlagRepository,
    ComplianceActionRepository, ComplianceRecordRepository,
};

/// Fails every publish while `down` is set
#[derive(Default)]
struct SwitchablePublisher {
    down: AtomicBool,
}

impl EventPublisher for SwitchablePublisher {
    fn publish(&self, envelope: EventEnvelope) -> Result<Vec<String>, PublishError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(PublishError::Other(anyhow::anyhow!("queue unavailable")));
        }
        Ok(vec![format!("job-{}", envelope.event_id)])
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    switch: Arc<SwitchablePublisher>,
    agent_repo: Arc<AgentRepository>,
    allocation_repo: Arc<AllocationRepository>,
    action_repo: Arc<ComplianceActionRepository>,
    agent_api: AgentApi,
    stock_api: StockApi,
    compliance_api: ComplianceApi,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("publish.db").to_string_lossy().to_string();
    let conn = open_sqlite_connection(&db_path).unwrap();
    apply_migrations(&conn).unwrap();
    let conn = Arc::new(Mutex::new(conn));

    let switch = Arc::new(SwitchablePublisher::default());
    let publisher = OptionalEventPublisher::with_publisher(switch.clone());

    let agent_repo = Arc::new(AgentRepository::new(conn.clone()));
    let allocation_repo = Arc::new(AllocationRepository::new(conn.clone()));
    let action_repo = Arc::new(ComplianceActionRepository::new(conn.clone()));
    let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

    let agent_api = AgentApi::new(
        agent_repo.clone(),
        action_log_repo.clone(),
        Arc::new(ZoneResolver::new()),
        Arc::new(MockConfig::default()),
        publisher.clone(),
    );
    let stock_api = StockApi::new(
        agent_repo.clone(),
        allocation_repo.clone(),
        action_log_repo.clone(),
        publisher.clone(),
    );
    let compliance_api = ComplianceApi::new(
        agent_repo.clone(),
        action_repo.clone(),
        Arc::new(ComplianceRecordRepository::new(conn.clone())),
        Arc::new(AuditFlagRepository::new(conn.clone())),
        action_log_repo,
        publisher,
    );

    Fixture {
        _dir: dir,
        switch,
        agent_repo,
        allocation_repo,
        action_repo,
        agent_api,
        stock_api,
        compliance_api,
    }
}

fn register_request(da_code: &str) -> RegisterAgentRequest {
    RegisterAgentRequest {
        da_code: da_code.to_string(),
        full_name: "Chidi Okafor".to_string(),
        phone: "08031234567".to_string(),
        location: "Ikeja".to_string(),
        rating: 4.5,
    }
}

impl Fixture {
    fn set_down(&self, down: bool) {
        self.switch.down.store(down, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_failed_publish_undoes_registration_and_allows_retry() {
    let f = fixture();

    f.set_down(true);
    let err = f
        .agent_api
        .register_agent(register_request("DA-0900"), "admin")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Other(_)));
    assert!(f.agent_repo.find_by_da_code("DA-0900").unwrap().is_none());

    f.set_down(false);
    let agent = f
        .agent_api
        .register_agent(register_request("DA-0900"), "admin")
        .await
        .unwrap();
    assert_eq!(agent.da_code, "DA-0900");
    assert!(f.agent_repo.find_by_da_code("DA-0900").unwrap().is_some());
}

#[tokio::test]
async fn test_failed_publish_restores_previous_agent_fields() {
    let f = fixture();
    let agent = f
        .agent_api
        .register_agent(register_request("DA-0901"), "admin")
        .await
        .unwrap();

    f.set_down(true);
    let changes = AgentChanges {
        location: Some("Wuse 2, Abuja".to_string()),
        ..Default::default()
    };
    assert!(f.agent_api.update_agent(&agent.agent_id, changes.clone(), "admin").is_err());

    let stored = f.agent_repo.find_by_id(&agent.agent_id).unwrap().unwrap();
    assert_eq!(stored.location, "Ikeja");
    assert_eq!(stored.zone, agent.zone);

    f.set_down(false);
    let result = f.agent_api.update_agent(&agent.agent_id, changes, "admin").unwrap();
    assert!(result.event_id.is_some());
    assert!(result.changed_fields.contains(&"location".to_string()));
}

#[tokio::test]
async fn test_failed_publish_undoes_allocation_and_action() {
    let f = fixture();
    f.agent_api
        .register_agent(register_request("DA-0902"), "admin")
        .await
        .unwrap();

    f.set_down(true);
    let items = vec![AllocationItem {
        product_code: "VV-SHAMPOO".to_string(),
        quantity: 10,
        unit_price: 2500.0,
    }];
    assert!(f.stock_api.allocate("DA-0902", items, "inventory_manager").is_err());
    assert!(f.allocation_repo.list_ids_by_da_code("DA-0902", 10).unwrap().is_empty());

    let err = f
        .compliance_api
        .record_action(RecordActionRequest {
            da_code: "DA-0902".to_string(),
            action_type: ComplianceActionType::Warning,
            reason: "late remittance".to_string(),
            initiated_by: "compliance_officer".to_string(),
            amount: None,
        })
        .unwrap_err();
    assert!(matches!(err, ApiError::Other(_)));
    assert!(f.action_repo.list_by_da_code("DA-0902").unwrap().is_empty());
}
