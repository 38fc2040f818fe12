use super::{BinRepository, ComplianceRecordRepository, RoleAgentRepository};
use crate::db::{now_ts, open_in_memory};
use crate::domain::bin::{Bin, COMPLIANCE_REASON};
use crate::domain::compliance::ComplianceRecord;
use crate::domain::role_agent::RoleAgent;
use crate::domain::types::{AgentStatus, BinStatus, ComplianceActionType};
use crate::domain::zone::Zone;
use crate::repository::error::RepositoryError;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(open_in_memory().unwrap()))
}

fn make_role_agent(code: &str, status: &str) -> RoleAgent {
    RoleAgent {
        role_agent_id: format!("ra-{}", code),
        external_da_code: code.to_string(),
        full_name: "Ngozi Eze".to_string(),
        phone: "+2348035550101".to_string(),
        zone: Zone::Enugu,
        status: status.to_string(),
        compliance_score: 100,
        last_event_id: Some("evt-1".to_string()),
        synced_at: now_ts(),
    }
}

fn make_bin(code: &str, capacity: i64) -> Bin {
    Bin {
        bin_id: format!("bin-{}", code),
        external_da_code: code.to_string(),
        zone: Zone::Enugu,
        capacity_units: capacity,
        current_stock_units: 0,
        current_stock_value: 0.0,
        status: BinStatus::Active,
        suspension_reason: None,
        suspended_at: None,
        updated_at: now_ts(),
    }
}

#[test]
fn test_role_agent_upsert_reports_creation() {
    let conn = setup_test_db();
    let mut guard = conn.lock().unwrap();
    let tx = guard.transaction().unwrap();

    assert!(RoleAgentRepository::upsert_tx(&tx, &make_role_agent("DA-0010", "active")).unwrap());

    let mut changed = make_role_agent("DA-0010", "suspended");
    changed.role_agent_id = "ignored-new-id".to_string();
    assert!(!RoleAgentRepository::upsert_tx(&tx, &changed).unwrap());
    tx.commit().unwrap();
    drop(guard);

    let repo = RoleAgentRepository::new(conn);
    let mirror = repo.find_by_da_code("DA-0010").unwrap().unwrap();
    assert_eq!(mirror.role_agent_id, "ra-DA-0010");
    assert_eq!(mirror.status, "suspended");
}

#[test]
fn test_role_agent_score_update_without_mirror() {
    let conn = setup_test_db();
    let mut guard = conn.lock().unwrap();
    let tx = guard.transaction().unwrap();
    let updated =
        RoleAgentRepository::update_score_status_tx(&tx, "DA-404", 50, "probation", "evt-9", now_ts())
            .unwrap();
    assert!(!updated);
}

#[test]
fn test_bin_movement_applied_once() {
    let conn = setup_test_db();
    {
        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().unwrap();
        BinRepository::insert_tx(&tx, &make_bin("DA-0011", 500)).unwrap();

        let now = now_ts();
        assert!(BinRepository::apply_movement_tx(&tx, "bin-DA-0011", "alloc-1", 40, 10_000.25, now).unwrap());
        assert!(!BinRepository::apply_movement_tx(&tx, "bin-DA-0011", "alloc-1", 40, 10_000.25, now).unwrap());
        assert!(BinRepository::movement_exists_tx(&tx, "alloc-1").unwrap());
        tx.commit().unwrap();
    }

    let bin = BinRepository::new(conn).find_by_da_code("DA-0011").unwrap().unwrap();
    assert_eq!(bin.current_stock_units, 40);
    assert!((bin.current_stock_value - 10_000.25).abs() < 1e-9);
}

#[test]
fn test_bin_suspend_and_reactivate() {
    let conn = setup_test_db();
    {
        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().unwrap();
        BinRepository::insert_tx(&tx, &make_bin("DA-0012", 500)).unwrap();
        BinRepository::update_status_tx(&tx, "bin-DA-0012", BinStatus::Suspended, Some(COMPLIANCE_REASON), now_ts())
            .unwrap();
        tx.commit().unwrap();
    }

    let repo = BinRepository::new(conn.clone());
    let bin = repo.find_by_da_code("DA-0012").unwrap().unwrap();
    assert!(bin.suspended_for_compliance());
    assert!(bin.suspended_at.is_some());
    assert_eq!(repo.list_by_status(BinStatus::Suspended).unwrap().len(), 1);

    {
        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().unwrap();
        BinRepository::update_status_tx(&tx, "bin-DA-0012", BinStatus::Active, Some("ignored"), now_ts()).unwrap();
        let err = BinRepository::update_status_tx(&tx, "bin-missing", BinStatus::Active, None, now_ts()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        tx.commit().unwrap();
    }

    let bin = repo.find_by_da_code("DA-0012").unwrap().unwrap();
    assert_eq!(bin.status, BinStatus::Active);
    assert_eq!(bin.suspension_reason, None);
    assert_eq!(bin.suspended_at, None);
}

#[test]
fn test_compliance_record_unique_per_action() {
    let conn = setup_test_db();
    let record = ComplianceRecord {
        record_id: "rec-1".to_string(),
        source_action_id: "ca-1".to_string(),
        external_da_code: "DA-0013".to_string(),
        action_type: ComplianceActionType::MajorViolation,
        points_delta: -25,
        score_before: 80,
        score_after: 55,
        status_before: AgentStatus::Active,
        status_after: AgentStatus::OnProbation,
        reason: "Cash shortfall".to_string(),
        recorded_at: now_ts(),
    };

    {
        let mut guard = conn.lock().unwrap();
        let tx = guard.transaction().unwrap();
        ComplianceRecordRepository::insert_tx(&tx, &record).unwrap();

        let mut dup = record.clone();
        dup.record_id = "rec-2".to_string();
        let err = ComplianceRecordRepository::insert_tx(&tx, &dup).unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));

        let found = ComplianceRecordRepository::find_by_source_action_tx(&tx, "ca-1").unwrap();
        assert_eq!(found, Some(record.clone()));
        tx.commit().unwrap();
    }

    let list = ComplianceRecordRepository::new(conn).list_by_da_code("DA-0013").unwrap();
    assert_eq!(list, vec![record]);
}
