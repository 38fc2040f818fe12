// ==========================================
// VitalVida Sync Pipeline - salary deduction repository
// ==========================================
// Table: salary_deductions (UNIQUE source_action_id)
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_opt_ts, parse_ts};
use crate::domain::deduction::{DeductionStatus, SalaryDeduction};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const DEDUCTION_COLUMNS: &str = "deduction_id, da_code, amount, reason, source_action_id, status, \
     escalation_id, created_at, decided_at";

pub struct DeductionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DeductionRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert_tx(conn: &Connection, deduction: &SalaryDeduction) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO salary_deductions (
                deduction_id, da_code, amount, reason, source_action_id, status,
                escalation_id, created_at, decided_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                deduction.deduction_id,
                deduction.da_code,
                deduction.amount,
                deduction.reason,
                deduction.source_action_id,
                deduction.status.as_str(),
                deduction.escalation_id,
                fmt_ts(&deduction.created_at),
                deduction.decided_at.as_ref().map(fmt_ts),
            ],
        )?;
        Ok(())
    }

    pub fn update_status_tx(
        conn: &Connection,
        deduction_id: &str,
        status: DeductionStatus,
        decided_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE salary_deductions SET status = ?2, decided_at = ?3 WHERE deduction_id = ?1",
            params![deduction_id, status.as_str(), fmt_ts(&decided_at)],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("SalaryDeduction", deduction_id));
        }
        Ok(())
    }

    pub fn find_by_id(&self, deduction_id: &str) -> RepositoryResult<Option<SalaryDeduction>> {
        let conn = self.get_conn()?;
        Self::find_by_id_tx(&conn, deduction_id)
    }

    pub fn find_by_id_tx(conn: &Connection, deduction_id: &str) -> RepositoryResult<Option<SalaryDeduction>> {
        let sql = format!("SELECT {} FROM salary_deductions WHERE deduction_id = ?1", DEDUCTION_COLUMNS);
        Ok(conn.query_row(&sql, params![deduction_id], map_deduction_row).optional()?)
    }

    pub fn find_by_source_action(&self, action_id: &str) -> RepositoryResult<Option<SalaryDeduction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM salary_deductions WHERE source_action_id = ?1",
            DEDUCTION_COLUMNS
        );
        Ok(conn.query_row(&sql, params![action_id], map_deduction_row).optional()?)
    }

    pub fn list_by_da_code(&self, da_code: &str) -> RepositoryResult<Vec<SalaryDeduction>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM salary_deductions WHERE da_code = ?1 ORDER BY created_at DESC, deduction_id",
            DEDUCTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let deductions = stmt
            .query_map(params![da_code], map_deduction_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(deductions)
    }
}

fn map_deduction_row(row: &Row<'_>) -> rusqlite::Result<SalaryDeduction> {
    let status: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(SalaryDeduction {
        deduction_id: row.get(0)?,
        da_code: row.get(1)?,
        amount: row.get(2)?,
        reason: row.get(3)?,
        source_action_id: row.get(4)?,
        status: parse_code(&status, 5, DeductionStatus::parse)?,
        escalation_id: row.get(6)?,
        created_at: parse_ts(&created_at, 7)?,
        decided_at: parse_opt_ts(row.get(8)?, 8)?,
    })
}
