use super::core::ActionLogRepository;
use crate::db::{fmt_ts, parse_opt_json, parse_ts};
use crate::domain::action_log::ActionLog;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::{params, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, event_id, action_type, action_ts, actor, payload_json, changes_json, da_code, detail";

impl ActionLogRepository {
    // ==========================================
    // Queries
    // ==========================================

    pub fn find_by_id(&self, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM action_log WHERE action_id = ?", LOG_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;

        match stmt.query_row(params![action_id], map_row) {
            Ok(log) => Ok(Some(log)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Everything one event caused, in write order
    pub fn find_by_event_id(&self, event_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE event_id = ? ORDER BY action_ts, rowid",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![event_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// History of one DA, newest first
    pub fn find_by_da_code(&self, da_code: &str, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE da_code = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![da_code, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn find_by_action_type(&self, action_type: &str, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE action_type = ? ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![action_type, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn find_by_time_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE action_ts BETWEEN ? AND ? ORDER BY action_ts DESC",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![fmt_ts(&start_time), fmt_ts(&end_time)], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log ORDER BY action_ts DESC, rowid DESC LIMIT ?",
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    pub fn count_by_actor(&self, actor: &str) -> RepositoryResult<i32> {
        let conn = self.get_conn()?;
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM action_log WHERE actor = ?",
            params![actor],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_row(row: &Row<'_>) -> SqliteResult<ActionLog> {
    let action_ts: String = row.get(3)?;
    Ok(ActionLog {
        action_id: row.get(0)?,
        event_id: row.get(1)?,
        action_type: row.get(2)?,
        action_ts: parse_ts(&action_ts, 3)?,
        actor: row.get(4)?,
        payload_json: parse_opt_json(row.get(5)?, 5)?,
        changes_json: parse_opt_json(row.get(6)?, 6)?,
        da_code: row.get(7)?,
        detail: row.get(8)?,
    })
}
