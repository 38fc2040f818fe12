// ==========================================
// VitalVida Sync Pipeline - processed event markers
// ==========================================
// Table: processed_events (event_id, listener)
// Rule: the marker is written in the same transaction as the
//       listener's mutation; a present marker means "already done"
// ==========================================

use crate::db::fmt_ts;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct ProcessedEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProcessedEventRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn is_processed(&self, event_id: &str, listener: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Self::is_processed_tx(&conn, event_id, listener)
    }

    pub fn is_processed_tx(conn: &Connection, event_id: &str, listener: &str) -> RepositoryResult<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM processed_events WHERE event_id = ?1 AND listener = ?2",
                params![event_id, listener],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Returns false when the marker already existed
    pub fn mark_processed_tx(
        conn: &Connection,
        event_id: &str,
        listener: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<bool> {
        let rows = conn.execute(
            "INSERT OR IGNORE INTO processed_events (event_id, listener, processed_at) VALUES (?1, ?2, ?3)",
            params![event_id, listener, fmt_ts(&now)],
        )?;
        Ok(rows > 0)
    }
}
