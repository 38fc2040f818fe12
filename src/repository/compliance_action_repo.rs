// ==========================================
// VitalVida Sync Pipeline - compliance action repository
// ==========================================
// Table: vv_compliance_actions (what operations recorded)
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_ts};
use crate::domain::compliance::ComplianceAction;
use crate::domain::types::ComplianceActionType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const ACTION_COLUMNS: &str = "action_id, da_code, action_type, reason, initiated_by, amount, created_at";

pub struct ComplianceActionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ComplianceActionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, action: &ComplianceAction) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO vv_compliance_actions (
                action_id, da_code, action_type, reason, initiated_by, amount, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                action.action_id,
                action.da_code,
                action.action_type.as_str(),
                action.reason,
                action.initiated_by,
                action.amount,
                fmt_ts(&action.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, action_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM vv_compliance_actions WHERE action_id = ?1", params![action_id])?;
        Ok(())
    }

    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ComplianceAction>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM vv_compliance_actions WHERE action_id = ?1", ACTION_COLUMNS);
        Ok(conn.query_row(&sql, params![action_id], map_action_row).optional()?)
    }

    /// Newest first
    pub fn list_by_da_code(&self, da_code: &str) -> RepositoryResult<Vec<ComplianceAction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM vv_compliance_actions WHERE da_code = ?1 ORDER BY created_at DESC, action_id",
            ACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let actions = stmt
            .query_map(params![da_code], map_action_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(actions)
    }
}

fn map_action_row(row: &Row<'_>) -> rusqlite::Result<ComplianceAction> {
    let action_type: String = row.get(2)?;
    let created_at: String = row.get(6)?;
    Ok(ComplianceAction {
        action_id: row.get(0)?,
        da_code: row.get(1)?,
        action_type: parse_code(&action_type, 2, ComplianceActionType::parse)?,
        reason: row.get(3)?,
        initiated_by: row.get(4)?,
        amount: row.get(5)?,
        created_at: parse_ts(&created_at, 6)?,
    })
}
