// ==========================================
// VitalVida Sync Pipeline - persistent job queue
// ==========================================
// Table: queued_jobs (UNIQUE event_id, listener), failed_jobs
// Claim: BEGIN IMMEDIATE + conditional UPDATE, so two workers
//        never run the same job
// ==========================================

use crate::db::{fmt_ts, parse_code, parse_opt_ts, parse_ts};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::job::{FailedJob, JobStatus, QueueStats, QueuedJob};
use chrono::{Duration, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};

const JOB_COLUMNS: &str = "job_id, event_id, listener, payload_json, status, attempts, max_attempts, \
     backoff_json, available_at, created_at, started_at, completed_at, error_message";

const FAILED_COLUMNS: &str =
    "failed_id, job_id, event_id, listener, payload_json, attempts, error_message, failed_at, retried_at";

pub struct JobQueue {
    conn: Arc<Mutex<Connection>>,
}

impl JobQueue {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| QueueError::LockError(e.to_string()))
    }

    /// Add a job; an existing (event_id, listener) pair returns the existing job id
    pub fn enqueue(&self, job: &QueuedJob) -> QueueResult<String> {
        let conn = self.lock()?;

        let inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO queued_jobs (
                job_id, event_id, listener, payload_json, status, attempts, max_attempts,
                backoff_json, available_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                job.job_id,
                job.event_id,
                job.listener,
                job.payload_json,
                job.status.as_str(),
                job.attempts,
                job.max_attempts,
                serde_json::to_string(&job.backoff)?,
                fmt_ts(&job.available_at),
                fmt_ts(&job.created_at),
            ],
        )?;

        if inserted > 0 {
            tracing::debug!(job_id = %job.job_id, listener = %job.listener, "job enqueued");
            return Ok(job.job_id.clone());
        }

        let existing: String = conn.query_row(
            "SELECT job_id FROM queued_jobs WHERE event_id = ?1 AND listener = ?2",
            params![job.event_id, job.listener],
            |row| row.get(0),
        )?;
        tracing::debug!(
            job_id = %existing,
            event_id = %job.event_id,
            listener = %job.listener,
            "event already queued for listener"
        );
        Ok(existing)
    }

    /// Claim the oldest due PENDING job: mark RUNNING, bump attempts
    pub fn dequeue(&self, now: NaiveDateTime) -> QueueResult<Option<QueuedJob>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!(
            "SELECT {} FROM queued_jobs WHERE status = 'PENDING' AND available_at <= ?1 \
             ORDER BY available_at, created_at, rowid LIMIT 1",
            JOB_COLUMNS
        );
        let candidate = tx
            .query_row(&sql, params![fmt_ts(&now)], map_job_row)
            .optional()?;

        let Some(mut job) = candidate else {
            return Ok(None);
        };

        let claimed = tx.execute(
            "UPDATE queued_jobs SET status = 'RUNNING', attempts = attempts + 1, started_at = ?2 \
             WHERE job_id = ?1 AND status = 'PENDING'",
            params![job.job_id, fmt_ts(&now)],
        )?;
        tx.commit()?;

        if claimed == 0 {
            return Ok(None);
        }

        job.status = JobStatus::Running;
        job.attempts += 1;
        job.started_at = Some(now);
        Ok(Some(job))
    }

    pub fn complete(&self, job_id: &str, now: NaiveDateTime) -> QueueResult<()> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE queued_jobs SET status = 'COMPLETED', completed_at = ?2, error_message = NULL \
             WHERE job_id = ?1 AND status = 'RUNNING'",
            params![job_id, fmt_ts(&now)],
        )?;
        expect_running(&conn, job_id, rows)
    }

    /// RUNNING -> PENDING, due again after `delay_seconds`
    pub fn release_for_retry(
        &self,
        job_id: &str,
        error: &str,
        delay_seconds: u64,
        now: NaiveDateTime,
    ) -> QueueResult<NaiveDateTime> {
        let available_at = now + Duration::seconds(delay_seconds as i64);
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE queued_jobs SET status = 'PENDING', available_at = ?2, error_message = ?3 \
             WHERE job_id = ?1 AND status = 'RUNNING'",
            params![job_id, fmt_ts(&available_at), error],
        )?;
        expect_running(&conn, job_id, rows)?;
        Ok(available_at)
    }

    /// RUNNING -> FAILED and copy into failed_jobs; returns the dead-letter id
    pub fn mark_failed(&self, job_id: &str, error: &str, now: NaiveDateTime) -> QueueResult<String> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE queued_jobs SET status = 'FAILED', completed_at = ?2, error_message = ?3 \
             WHERE job_id = ?1 AND status = 'RUNNING'",
            params![job_id, fmt_ts(&now), error],
        )?;
        expect_running(&tx, job_id, rows)?;

        let failed_id = uuid::Uuid::new_v4().to_string();
        tx.execute(
            r#"
            INSERT INTO failed_jobs (
                failed_id, job_id, event_id, listener, payload_json, attempts, error_message, failed_at
            )
            SELECT ?1, job_id, event_id, listener, payload_json, attempts, ?2, ?3
            FROM queued_jobs WHERE job_id = ?4
            "#,
            params![failed_id, error, fmt_ts(&now), job_id],
        )?;

        tx.commit()?;
        Ok(failed_id)
    }

    /// RUNNING jobs started before `now - stale_after` go back to PENDING
    pub fn recover_stale(&self, now: NaiveDateTime, stale_after: Duration) -> QueueResult<usize> {
        let cutoff = now - stale_after;
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE queued_jobs SET status = 'PENDING', available_at = ?2, \
                 error_message = 'recovered from stale RUNNING state' \
             WHERE status = 'RUNNING' AND started_at <= ?1",
            params![fmt_ts(&cutoff), fmt_ts(&now)],
        )?;
        if rows > 0 {
            tracing::warn!(recovered = rows, "stale running jobs returned to the queue");
        }
        Ok(rows)
    }

    /// PENDING -> CANCELLED; false when the job is not pending
    pub fn cancel(&self, job_id: &str) -> QueueResult<bool> {
        let conn = self.lock()?;
        let rows = conn.execute(
            "UPDATE queued_jobs SET status = 'CANCELLED' WHERE job_id = ?1 AND status = 'PENDING'",
            params![job_id],
        )?;
        Ok(rows > 0)
    }

    pub fn get(&self, job_id: &str) -> QueueResult<Option<QueuedJob>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM queued_jobs WHERE job_id = ?1", JOB_COLUMNS);
        Ok(conn.query_row(&sql, params![job_id], map_job_row).optional()?)
    }

    pub fn find_by_event(&self, event_id: &str) -> QueueResult<Vec<QueuedJob>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM queued_jobs WHERE event_id = ?1 ORDER BY created_at, rowid",
            JOB_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params![event_id], map_job_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    pub fn stats(&self) -> QueueResult<QueueStats> {
        let conn = self.lock()?;

        let mut stats = QueueStats::default();
        {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM queued_jobs GROUP BY status")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?;
            for row in rows {
                let (status, count) = row?;
                match JobStatus::parse(&status) {
                    Some(JobStatus::Pending) => stats.pending_count = count,
                    Some(JobStatus::Running) => stats.running_count = count,
                    Some(JobStatus::Completed) => stats.completed_count = count,
                    Some(JobStatus::Failed) => stats.failed_count = count,
                    Some(JobStatus::Cancelled) => stats.cancelled_count = count,
                    None => tracing::warn!(%status, "unknown job status in queue"),
                }
            }
        }
        stats.dead_letter_count = conn.query_row(
            "SELECT COUNT(*) FROM failed_jobs WHERE retried_at IS NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(stats)
    }

    /// Dead letters not yet retried, newest first
    pub fn list_failed(&self, limit: i64) -> QueueResult<Vec<FailedJob>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM failed_jobs WHERE retried_at IS NULL ORDER BY failed_at DESC, rowid DESC LIMIT ?1",
            FAILED_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let failed = stmt
            .query_map(params![limit], map_failed_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(failed)
    }

    /// Put a dead letter back on the queue with attempts reset; returns the job id
    pub fn retry_failed(&self, failed_id: &str, now: NaiveDateTime) -> QueueResult<String> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let sql = format!("SELECT {} FROM failed_jobs WHERE failed_id = ?1", FAILED_COLUMNS);
        let failed = tx
            .query_row(&sql, params![failed_id], map_failed_row)
            .optional()?
            .ok_or_else(|| QueueError::JobNotFound(failed_id.to_string()))?;

        if failed.retried_at.is_some() {
            return Err(QueueError::InvalidState {
                id: failed_id.to_string(),
                status: "RETRIED".to_string(),
                expected: "not yet retried".to_string(),
            });
        }

        let rows = tx.execute(
            r#"
            UPDATE queued_jobs
            SET status = 'PENDING', attempts = 0, available_at = ?2, started_at = NULL,
                completed_at = NULL, error_message = NULL
            WHERE job_id = ?1 AND status = 'FAILED'
            "#,
            params![failed.job_id, fmt_ts(&now)],
        )?;
        if rows == 0 {
            return Err(QueueError::InvalidState {
                id: failed.job_id.clone(),
                status: "not FAILED".to_string(),
                expected: JobStatus::Failed.as_str().to_string(),
            });
        }

        tx.execute(
            "UPDATE failed_jobs SET retried_at = ?2 WHERE failed_id = ?1",
            params![failed_id, fmt_ts(&now)],
        )?;
        tx.commit()?;

        tracing::info!(%failed_id, job_id = %failed.job_id, listener = %failed.listener, "dead letter requeued");
        Ok(failed.job_id)
    }
}

/// Turn "0 rows updated" into NotFound / InvalidState
fn expect_running(conn: &Connection, job_id: &str, rows: usize) -> QueueResult<()> {
    if rows > 0 {
        return Ok(());
    }
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM queued_jobs WHERE job_id = ?1",
            params![job_id],
            |row| row.get(0),
        )
        .optional()?;
    match status {
        None => Err(QueueError::JobNotFound(job_id.to_string())),
        Some(status) => Err(QueueError::InvalidState {
            id: job_id.to_string(),
            status,
            expected: JobStatus::Running.as_str().to_string(),
        }),
    }
}

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<QueuedJob> {
    let status: String = row.get(4)?;
    let backoff_json: String = row.get(7)?;
    let available_at: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let backoff: Vec<u64> = serde_json::from_str(&backoff_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(QueuedJob {
        job_id: row.get(0)?,
        event_id: row.get(1)?,
        listener: row.get(2)?,
        payload_json: row.get(3)?,
        status: parse_code(&status, 4, JobStatus::parse)?,
        attempts: row.get(5)?,
        max_attempts: row.get(6)?,
        backoff,
        available_at: parse_ts(&available_at, 8)?,
        created_at: parse_ts(&created_at, 9)?,
        started_at: parse_opt_ts(row.get(10)?, 10)?,
        completed_at: parse_opt_ts(row.get(11)?, 11)?,
        error_message: row.get(12)?,
    })
}

fn map_failed_row(row: &Row<'_>) -> rusqlite::Result<FailedJob> {
    let failed_at: String = row.get(7)?;
    Ok(FailedJob {
        failed_id: row.get(0)?,
        job_id: row.get(1)?,
        event_id: row.get(2)?,
        listener: row.get(3)?,
        payload_json: row.get(4)?,
        attempts: row.get(5)?,
        error_message: row.get(6)?,
        failed_at: parse_ts(&failed_at, 7)?,
        retried_at: parse_opt_ts(row.get(8)?, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{now_ts, open_in_memory};
    use crate::queue::retry::RetryPolicy;

    fn queue() -> JobQueue {
        JobQueue::new(Arc::new(Mutex::new(open_in_memory().unwrap())))
    }

    fn job(event_id: &str, listener: &str, now: NaiveDateTime) -> QueuedJob {
        QueuedJob::new(event_id, listener, "{}".to_string(), &RetryPolicy::new(3, vec![10, 30]), now)
    }

    #[test]
    fn test_enqueue_is_idempotent_per_event_and_listener() {
        let q = queue();
        let now = now_ts();
        let first = q.enqueue(&job("evt-1", "l1", now)).unwrap();
        let second = q.enqueue(&job("evt-1", "l1", now)).unwrap();
        let other = q.enqueue(&job("evt-1", "l2", now)).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(q.stats().unwrap().pending_count, 2);
    }

    #[test]
    fn test_dequeue_claims_due_jobs_once() {
        let q = queue();
        let now = now_ts();
        let mut later = job("evt-2", "l1", now);
        later.available_at = now + Duration::seconds(60);
        q.enqueue(&later).unwrap();
        let id = q.enqueue(&job("evt-1", "l1", now)).unwrap();

        let claimed = q.dequeue(now).unwrap().unwrap();
        assert_eq!(claimed.job_id, id);
        assert_eq!(claimed.status, JobStatus::Running);
        assert_eq!(claimed.attempts, 1);

        // evt-2 is not due yet
        assert!(q.dequeue(now).unwrap().is_none());
        assert!(q.dequeue(now + Duration::seconds(60)).unwrap().is_some());
    }

    #[test]
    fn test_release_for_retry_delays_job() {
        let q = queue();
        let now = now_ts();
        q.enqueue(&job("evt-1", "l1", now)).unwrap();
        let claimed = q.dequeue(now).unwrap().unwrap();

        let due = q.release_for_retry(&claimed.job_id, "role db busy", 10, now).unwrap();
        assert_eq!(due, now + Duration::seconds(10));
        assert!(q.dequeue(now + Duration::seconds(9)).unwrap().is_none());

        let again = q.dequeue(due).unwrap().unwrap();
        assert_eq!(again.attempts, 2);
        assert_eq!(again.error_message.as_deref(), Some("role db busy"));
    }

    #[test]
    fn test_mark_failed_then_retry_dead_letter() {
        let q = queue();
        let now = now_ts();
        q.enqueue(&job("evt-1", "l1", now)).unwrap();
        let claimed = q.dequeue(now).unwrap().unwrap();

        let failed_id = q.mark_failed(&claimed.job_id, "agent not found", now).unwrap();
        let stats = q.stats().unwrap();
        assert_eq!(stats.failed_count, 1);
        assert_eq!(stats.dead_letter_count, 1);

        let dead = q.list_failed(10).unwrap();
        assert_eq!(dead[0].failed_id, failed_id);
        assert_eq!(dead[0].attempts, 1);

        let job_id = q.retry_failed(&failed_id, now).unwrap();
        assert_eq!(job_id, claimed.job_id);
        let requeued = q.get(&job_id).unwrap().unwrap();
        assert_eq!(requeued.status, JobStatus::Pending);
        assert_eq!(requeued.attempts, 0);
        assert!(q.list_failed(10).unwrap().is_empty());

        assert!(matches!(
            q.retry_failed(&failed_id, now),
            Err(QueueError::InvalidState { .. })
        ));
        assert!(matches!(q.retry_failed("nope", now), Err(QueueError::JobNotFound(_))));
    }

    #[test]
    fn test_complete_requires_running() {
        let q = queue();
        let now = now_ts();
        let id = q.enqueue(&job("evt-1", "l1", now)).unwrap();
        assert!(matches!(q.complete(&id, now), Err(QueueError::InvalidState { .. })));
        assert!(matches!(q.complete("missing", now), Err(QueueError::JobNotFound(_))));

        q.dequeue(now).unwrap();
        q.complete(&id, now).unwrap();
        assert_eq!(q.get(&id).unwrap().unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn test_recover_stale_and_cancel() {
        let q = queue();
        let now = now_ts();
        let running = q.enqueue(&job("evt-1", "l1", now)).unwrap();
        let pending = q.enqueue(&job("evt-2", "l1", now)).unwrap();
        q.dequeue(now).unwrap();

        assert_eq!(q.recover_stale(now + Duration::seconds(10), Duration::seconds(300)).unwrap(), 0);
        assert_eq!(q.recover_stale(now + Duration::seconds(301), Duration::seconds(300)).unwrap(), 1);
        assert_eq!(q.get(&running).unwrap().unwrap().status, JobStatus::Pending);

        assert!(q.cancel(&pending).unwrap());
        assert!(!q.cancel(&pending).unwrap());
        assert_eq!(q.stats().unwrap().cancelled_count, 1);
    }
}
