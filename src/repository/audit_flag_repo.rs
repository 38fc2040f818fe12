// ==========================================
// VitalVida Sync Pipeline - audit flag repository
// ==========================================
// Table: audit_flags
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_opt_json, parse_opt_ts, parse_ts};
use crate::domain::audit_flag::{AuditFlag, AuditFlagType, FlagStatus};
use crate::domain::types::Severity;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const FLAG_COLUMNS: &str = "flag_id, da_code, flag_type, severity, details_json, status, raised_by, \
     related_event_id, created_at, resolved_at, resolved_by, resolution_note";

pub struct AuditFlagRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AuditFlagRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, flag: &AuditFlag) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, flag)
    }

    /// Insert on any connection or open transaction
    pub fn insert_tx(conn: &Connection, flag: &AuditFlag) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO audit_flags (
                flag_id, da_code, flag_type, severity, details_json, status, raised_by,
                related_event_id, created_at, resolved_at, resolved_by, resolution_note
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                flag.flag_id,
                flag.da_code,
                flag.flag_type.as_str(),
                flag.severity.as_str(),
                flag.details.as_ref().map(|v| v.to_string()),
                flag.status.as_str(),
                flag.raised_by,
                flag.related_event_id,
                fmt_ts(&flag.created_at),
                flag.resolved_at.as_ref().map(fmt_ts),
                flag.resolved_by,
                flag.resolution_note,
            ],
        )?;
        Ok(flag.flag_id.clone())
    }

    pub fn find_by_id(&self, flag_id: &str) -> RepositoryResult<Option<AuditFlag>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM audit_flags WHERE flag_id = ?1", FLAG_COLUMNS);
        Ok(conn.query_row(&sql, params![flag_id], map_flag_row).optional()?)
    }

    /// Open flags, most severe first then oldest first
    pub fn list_open(&self, limit: i64) -> RepositoryResult<Vec<AuditFlag>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {} FROM audit_flags
            WHERE status = 'OPEN'
            ORDER BY CASE severity WHEN 'CRITICAL' THEN 0 WHEN 'WARNING' THEN 1 ELSE 2 END,
                     created_at, flag_id
            LIMIT ?1
            "#,
            FLAG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let flags = stmt
            .query_map(params![limit], map_flag_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flags)
    }

    pub fn list_by_da_code(&self, da_code: &str) -> RepositoryResult<Vec<AuditFlag>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM audit_flags WHERE da_code = ?1 ORDER BY created_at, flag_id",
            FLAG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let flags = stmt
            .query_map(params![da_code], map_flag_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(flags)
    }

    /// OPEN -> RESOLVED; resolving a non-open flag is an invalid transition
    pub fn resolve(
        &self,
        flag_id: &str,
        resolved_by: &str,
        note: Option<&str>,
        now: NaiveDateTime,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE audit_flags
            SET status = 'RESOLVED', resolved_at = ?2, resolved_by = ?3, resolution_note = ?4
            WHERE flag_id = ?1 AND status = 'OPEN'
            "#,
            params![flag_id, fmt_ts(&now), resolved_by, note],
        )?;
        if rows > 0 {
            return Ok(());
        }

        let status: Option<String> = conn
            .query_row(
                "SELECT status FROM audit_flags WHERE flag_id = ?1",
                params![flag_id],
                |row| row.get(0),
            )
            .optional()?;
        match status {
            None => Err(RepositoryError::not_found("AuditFlag", flag_id)),
            Some(from) => Err(RepositoryError::InvalidStateTransition {
                from,
                to: FlagStatus::Resolved.as_str().to_string(),
            }),
        }
    }
}

fn map_flag_row(row: &Row<'_>) -> rusqlite::Result<AuditFlag> {
    let flag_type: String = row.get(2)?;
    let severity: String = row.get(3)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(8)?;
    Ok(AuditFlag {
        flag_id: row.get(0)?,
        da_code: row.get(1)?,
        flag_type: parse_code(&flag_type, 2, AuditFlagType::parse)?,
        severity: parse_code(&severity, 3, Severity::parse)?,
        details: parse_opt_json(row.get(4)?, 4)?,
        status: parse_code(&status, 5, FlagStatus::parse)?,
        raised_by: row.get(6)?,
        related_event_id: row.get(7)?,
        created_at: parse_ts(&created_at, 8)?,
        resolved_at: parse_opt_ts(row.get(9)?, 9)?,
        resolved_by: row.get(10)?,
        resolution_note: row.get(11)?,
    })
}
