use crate::db::{fmt_ts, parse_code, parse_ts};
use crate::domain::compliance::ComplianceRecord;
use crate::domain::types::{AgentStatus, ComplianceActionType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::sync::{Arc, Mutex, MutexGuard};

const RECORD_COLUMNS: &str = "record_id, source_action_id, external_da_code, action_type, points_delta, \
     score_before, score_after, status_before, status_after, reason, recorded_at";

// ==========================================
// ComplianceRecordRepository - applied compliance actions
// ==========================================
pub struct ComplianceRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ComplianceRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// One record per source action (UNIQUE source_action_id)
    pub fn insert_tx(tx: &Transaction<'_>, record: &ComplianceRecord) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO role_compliance_records (
                record_id, source_action_id, external_da_code, action_type, points_delta,
                score_before, score_after, status_before, status_after, reason, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.record_id,
                record.source_action_id,
                record.external_da_code,
                record.action_type.as_str(),
                record.points_delta,
                record.score_before,
                record.score_after,
                record.status_before.as_str(),
                record.status_after.as_str(),
                record.reason,
                fmt_ts(&record.recorded_at),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_source_action_tx(
        conn: &Connection,
        action_id: &str,
    ) -> RepositoryResult<Option<ComplianceRecord>> {
        let sql = format!(
            "SELECT {} FROM role_compliance_records WHERE source_action_id = ?1",
            RECORD_COLUMNS
        );
        Ok(conn.query_row(&sql, params![action_id], map_record_row).optional()?)
    }

    /// Newest first
    pub fn list_by_da_code(&self, da_code: &str) -> RepositoryResult<Vec<ComplianceRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM role_compliance_records WHERE external_da_code = ?1 \
             ORDER BY recorded_at DESC, rowid DESC",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![da_code], map_record_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<ComplianceRecord> {
    let action_type: String = row.get(3)?;
    let status_before: String = row.get(7)?;
    let status_after: String = row.get(8)?;
    let recorded_at: String = row.get(10)?;
    Ok(ComplianceRecord {
        record_id: row.get(0)?,
        source_action_id: row.get(1)?,
        external_da_code: row.get(2)?,
        action_type: parse_code(&action_type, 3, ComplianceActionType::parse)?,
        points_delta: row.get(4)?,
        score_before: row.get(5)?,
        score_after: row.get(6)?,
        status_before: parse_code(&status_before, 7, AgentStatus::parse)?,
        status_after: parse_code(&status_after, 8, AgentStatus::parse)?,
        reason: row.get(9)?,
        recorded_at: parse_ts(&recorded_at, 10)?,
    })
}
