use crate::db::fmt_ts;
use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository
// ==========================================
// Rule: data mapping only
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // Writes
    // ==========================================

    /// Insert one entry and return its action_id
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, log)
    }

    /// Insert inside the caller's connection or transaction
    pub fn insert_tx(conn: &Connection, log: &ActionLog) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, event_id, action_type, action_ts, actor,
                payload_json, changes_json, da_code, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.action_id,
                log.event_id,
                log.action_type,
                fmt_ts(&log.action_ts),
                log.actor,
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.changes_json.as_ref().map(|v| v.to_string()),
                log.da_code,
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    pub fn batch_insert(&self, logs: &[ActionLog]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for log in logs {
            Self::insert_tx(&tx, log)?;
            count += 1;
        }

        tx.commit()?;
        Ok(count)
    }
}
