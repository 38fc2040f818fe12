use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType, ChangeSet};
use chrono::Duration;
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(crate::db::open_in_memory().unwrap()))
}

fn make_test_log(action_type: ActionType, event_id: &str, da_code: &str, actor: &str) -> ActionLog {
    ActionLog::new(action_type, actor)
        .with_event(event_id)
        .with_da_code(da_code)
        .with_payload(&json!({ "da_code": da_code }))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let mut changes = ChangeSet::new();
    changes.record("bin", "status", Some("ACTIVE".into()), Some("SUSPENDED".into()));
    let log = make_test_log(ActionType::BinStatusChanged, "evt-1", "DA-0001", "sync_agent_to_role_system")
        .with_changes(&changes);

    let id = repo.insert(&log).unwrap();
    let found = repo.find_by_id(&id).unwrap().unwrap();

    assert_eq!(found.action_type, "BinStatusChanged");
    assert_eq!(found.event_id.as_deref(), Some("evt-1"));
    assert_eq!(found.payload_json, Some(json!({ "da_code": "DA-0001" })));
    assert_eq!(found.detail.as_deref(), Some("bin.status: ACTIVE→SUSPENDED"));
    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_event_and_da_code() {
    let repo = ActionLogRepository::new(setup_test_db());
    let logs = vec![
        make_test_log(ActionType::RoleAgentSynced, "evt-1", "DA-0001", "sync_agent_to_role_system"),
        make_test_log(ActionType::BinCreated, "evt-1", "DA-0001", "sync_agent_to_role_system"),
        make_test_log(ActionType::StockApplied, "evt-2", "DA-0002", "sync_stock_to_bin_system"),
    ];
    assert_eq!(repo.batch_insert(&logs).unwrap(), 3);

    let by_event = repo.find_by_event_id("evt-1").unwrap();
    assert_eq!(by_event.len(), 2);
    assert_eq!(by_event[0].action_type, "RoleAgentSynced");
    assert_eq!(by_event[1].action_type, "BinCreated");

    assert_eq!(repo.find_by_da_code("DA-0002", 10).unwrap().len(), 1);
    assert_eq!(repo.find_by_action_type("StockApplied", 10).unwrap().len(), 1);
    assert_eq!(repo.count_by_actor("sync_agent_to_role_system").unwrap(), 2);
}

#[test]
fn test_find_by_time_range_and_recent() {
    let repo = ActionLogRepository::new(setup_test_db());
    let mut old = make_test_log(ActionType::AgentRegistered, "evt-0", "DA-0003", "ops");
    old.action_ts = old.action_ts - Duration::days(3);
    let fresh = make_test_log(ActionType::AgentUpdated, "evt-3", "DA-0003", "ops");
    repo.insert(&old).unwrap();
    repo.insert(&fresh).unwrap();

    let window = repo
        .find_by_time_range(fresh.action_ts - Duration::hours(1), fresh.action_ts + Duration::hours(1))
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].action_id, fresh.action_id);

    let recent = repo.find_recent(1).unwrap();
    assert_eq!(recent[0].action_id, fresh.action_id);
}
