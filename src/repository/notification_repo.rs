// ==========================================
// VitalVida Sync Pipeline - notification outbox repository
// ==========================================
// Table: notifications
// Listeners enqueue (QUEUED); notify::NotificationDispatcher
// drains the outbox and marks SENT / FAILED.
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_opt_ts, parse_ts};
use crate::domain::notification::{Channel, Notification, NotificationStatus, RecipientKind};
use crate::domain::types::Severity;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const NOTIFICATION_COLUMNS: &str = "notification_id, recipient_kind, recipient, channel, category, \
     severity, message, status, related_event_id, created_at, sent_at, error_message";

pub struct NotificationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl NotificationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, notification: &Notification) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::insert_tx(&conn, notification)
    }

    pub fn insert_tx(conn: &Connection, n: &Notification) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO notifications (
                notification_id, recipient_kind, recipient, channel, category, severity,
                message, status, related_event_id, created_at, sent_at, error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                n.notification_id,
                n.recipient_kind.as_str(),
                n.recipient,
                n.channel.as_str(),
                n.category,
                n.severity.as_str(),
                n.message,
                n.status.as_str(),
                n.related_event_id,
                fmt_ts(&n.created_at),
                n.sent_at.as_ref().map(fmt_ts),
                n.error_message,
            ],
        )?;
        Ok(())
    }

    /// Oldest queued first
    pub fn list_queued(&self, limit: i64) -> RepositoryResult<Vec<Notification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM notifications WHERE status = 'QUEUED' ORDER BY created_at, rowid LIMIT ?1",
            NOTIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let list = stmt
            .query_map(params![limit], map_notification_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(list)
    }

    pub fn list_by_recipient(&self, recipient: &str) -> RepositoryResult<Vec<Notification>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM notifications WHERE recipient = ?1 ORDER BY created_at, rowid",
            NOTIFICATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let list = stmt
            .query_map(params![recipient], map_notification_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(list)
    }

    pub fn mark_sent(&self, notification_id: &str, now: NaiveDateTime) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE notifications SET status = 'SENT', sent_at = ?2, error_message = NULL WHERE notification_id = ?1",
            params![notification_id, fmt_ts(&now)],
        )?;
        Ok(())
    }

    pub fn mark_failed(&self, notification_id: &str, error: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE notifications SET status = 'FAILED', error_message = ?2 WHERE notification_id = ?1",
            params![notification_id, error],
        )?;
        Ok(())
    }
}

fn map_notification_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(1)?;
    let channel: String = row.get(3)?;
    let severity: String = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    Ok(Notification {
        notification_id: row.get(0)?,
        recipient_kind: parse_code(&kind, 1, RecipientKind::parse)?,
        recipient: row.get(2)?,
        channel: parse_code(&channel, 3, Channel::parse)?,
        category: row.get(4)?,
        severity: parse_code(&severity, 5, Severity::parse)?,
        message: row.get(6)?,
        status: parse_code(&status, 7, NotificationStatus::parse)?,
        related_event_id: row.get(8)?,
        created_at: parse_ts(&created_at, 9)?,
        sent_at: parse_opt_ts(row.get(10)?, 10)?,
        error_message: row.get(11)?,
    })
}
