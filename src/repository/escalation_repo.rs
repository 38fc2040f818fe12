// ==========================================
// VitalVida Sync Pipeline - escalation repository
// ==========================================
// Tables: escalation_requests + escalation_approvals
// Rule: approval rules live in api::escalation_api; this
//       layer only stores what it is told
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_opt_ts, parse_ts};
use crate::domain::escalation::{Approval, ApproverRole, EscalationRequest, EscalationStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const REQUEST_COLUMNS: &str = "escalation_id, subject_type, subject_id, da_code, amount, threshold, \
     required_approvals, status, requested_by, created_at, expires_at, decided_at, rejection_reason";

pub struct EscalationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EscalationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ===== writes =====

    pub fn insert_tx(conn: &Connection, request: &EscalationRequest) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO escalation_requests (
                escalation_id, subject_type, subject_id, da_code, amount, threshold,
                required_approvals, status, requested_by, created_at, expires_at,
                decided_at, rejection_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                request.escalation_id,
                request.subject_type,
                request.subject_id,
                request.da_code,
                request.amount,
                request.threshold,
                request.required_approvals,
                request.status.as_str(),
                request.requested_by,
                fmt_ts(&request.created_at),
                fmt_ts(&request.expires_at),
                request.decided_at.as_ref().map(fmt_ts),
                request.rejection_reason,
            ],
        )?;
        for approval in &request.approvals {
            Self::add_approval_tx(conn, &request.escalation_id, approval)?;
        }
        Ok(())
    }

    /// PRIMARY KEY (escalation_id, approver) rejects a second approval by the same person
    pub fn add_approval_tx(conn: &Connection, escalation_id: &str, approval: &Approval) -> RepositoryResult<()> {
        conn.execute(
            "INSERT INTO escalation_approvals (escalation_id, approver, approver_role, decided_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                escalation_id,
                approval.approver,
                approval.role.as_str(),
                fmt_ts(&approval.decided_at),
            ],
        )?;
        Ok(())
    }

    pub fn update_status_tx(
        conn: &Connection,
        escalation_id: &str,
        status: EscalationStatus,
        decided_at: Option<NaiveDateTime>,
        rejection_reason: Option<&str>,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE escalation_requests
            SET status = ?2, decided_at = ?3, rejection_reason = COALESCE(?4, rejection_reason)
            WHERE escalation_id = ?1
            "#,
            params![
                escalation_id,
                status.as_str(),
                decided_at.as_ref().map(fmt_ts),
                rejection_reason,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("EscalationRequest", escalation_id));
        }
        Ok(())
    }

    // ===== reads =====

    pub fn find_by_id(&self, escalation_id: &str) -> RepositoryResult<Option<EscalationRequest>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, escalation_id)
    }

    pub fn find_by_id_tx(conn: &Connection, escalation_id: &str) -> RepositoryResult<Option<EscalationRequest>> {
        let sql = format!(
            "SELECT {} FROM escalation_requests WHERE escalation_id = ?1",
            REQUEST_COLUMNS
        );
        let request = conn
            .query_row(&sql, params![escalation_id], map_request_row)
            .optional()?;

        match request {
            Some(mut request) => {
                request.approvals = load_approvals(conn, escalation_id)?;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    /// Pending and partially approved requests, oldest first
    pub fn list_pending(&self) -> RepositoryResult<Vec<EscalationRequest>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM escalation_requests WHERE status IN ('PENDING', 'PARTIALLY_APPROVED') \
             ORDER BY created_at, escalation_id",
            REQUEST_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut requests = stmt
            .query_map([], map_request_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for request in requests.iter_mut() {
            request.approvals = load_approvals(&conn, &request.escalation_id)?;
        }
        Ok(requests)
    }

    /// Ids of open requests whose expiry is at or before `now`
    pub fn list_expired_ids_tx(conn: &Connection, now: NaiveDateTime) -> RepositoryResult<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT escalation_id FROM escalation_requests \
             WHERE status IN ('PENDING', 'PARTIALLY_APPROVED') AND expires_at <= ?1 \
             ORDER BY expires_at",
        )?;
        let ids = stmt
            .query_map(params![fmt_ts(&now)], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(ids)
    }
}

fn load_approvals(conn: &Connection, escalation_id: &str) -> RepositoryResult<Vec<Approval>> {
    let mut stmt = conn.prepare(
        "SELECT approver, approver_role, decided_at FROM escalation_approvals \
         WHERE escalation_id = ?1 ORDER BY decided_at, rowid",
    )?;
    let approvals = stmt
        .query_map(params![escalation_id], |row| {
            let role: String = row.get(1)?;
            let decided_at: String = row.get(2)?;
            Ok(Approval {
                approver: row.get(0)?,
                role: parse_code(&role, 1, ApproverRole::parse)?,
                decided_at: parse_ts(&decided_at, 2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(approvals)
}

fn map_request_row(row: &Row<'_>) -> rusqlite::Result<EscalationRequest> {
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let expires_at: String = row.get(10)?;
    Ok(EscalationRequest {
        escalation_id: row.get(0)?,
        subject_type: row.get(1)?,
        subject_id: row.get(2)?,
        da_code: row.get(3)?,
        amount: row.get(4)?,
        threshold: row.get(5)?,
        required_approvals: row.get(6)?,
        status: parse_code(&status, 7, EscalationStatus::parse)?,
        requested_by: row.get(8)?,
        approvals: Vec::new(),
        created_at: parse_ts(&created_at, 9)?,
        expires_at: parse_ts(&expires_at, 10)?,
        decided_at: parse_opt_ts(row.get(11)?, 11)?,
        rejection_reason: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_ts, open_in_memory};
    use crate::domain::escalation::SUBJECT_SALARY_DEDUCTION;
    use chrono::Duration;

    fn request(id: &str, expires_in_hours: i64) -> EscalationRequest {
        let now = now_ts();
        EscalationRequest {
            escalation_id: id.to_string(),
            subject_type: SUBJECT_SALARY_DEDUCTION.to_string(),
            subject_id: "ded-1".to_string(),
            da_code: Some("DA-0020".to_string()),
            amount: 75_000.0,
            threshold: 50_000.0,
            required_approvals: 2,
            status: EscalationStatus::Pending,
            requested_by: "handle_compliance_action".to_string(),
            approvals: Vec::new(),
            created_at: now,
            expires_at: now + Duration::hours(expires_in_hours),
            decided_at: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn test_approvals_roundtrip_and_duplicate_approver() {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let approval = Approval {
            approver: "fin.bola".to_string(),
            role: ApproverRole::Finance,
            decided_at: now_ts(),
        };
        {
            let guard = conn.lock().unwrap();
            EscalationRepository::insert_tx(&guard, &request("esc-1", 48)).unwrap();
            EscalationRepository::add_approval_tx(&guard, "esc-1", &approval).unwrap();
            let dup = EscalationRepository::add_approval_tx(&guard, "esc-1", &approval).unwrap_err();
            assert!(matches!(dup, RepositoryError::UniqueConstraintViolation(_)));
            EscalationRepository::update_status_tx(&guard, "esc-1", EscalationStatus::PartiallyApproved, None, None)
                .unwrap();
        }

        let repo = EscalationRepository::new(conn);
        let loaded = repo.find_by_id("esc-1").unwrap().unwrap();
        assert_eq!(loaded.approvals, vec![approval]);
        assert_eq!(loaded.status, EscalationStatus::PartiallyApproved);
        assert_eq!(repo.list_pending().unwrap().len(), 1);
    }

    #[test]
    fn test_list_expired_ids() {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let guard = conn.lock().unwrap();
        EscalationRepository::insert_tx(&guard, &request("esc-old", -1)).unwrap();
        EscalationRepository::insert_tx(&guard, &request("esc-new", 48)).unwrap();

        let expired = EscalationRepository::list_expired_ids_tx(&guard, now_ts()).unwrap();
        assert_eq!(expired, vec!["esc-old".to_string()]);
    }
}
