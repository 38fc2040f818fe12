// ==========================================
// VitalVida Sync Pipeline - queued job model
// ==========================================
// One row per (event_id, listener).
// Lifecycle: PENDING -> RUNNING -> COMPLETED
//                             \-> PENDING (retry, delayed)
//                             \-> FAILED (copied to failed_jobs)
//            PENDING -> CANCELLED
// ==========================================

use crate::queue::retry::RetryPolicy;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
            JobStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobStatus::Pending),
            "RUNNING" => Some(JobStatus::Running),
            "COMPLETED" => Some(JobStatus::Completed),
            "FAILED" => Some(JobStatus::Failed),
            "CANCELLED" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: String,
    pub event_id: String,
    pub listener: String,
    /// Serialized EventEnvelope
    pub payload_json: String,
    pub status: JobStatus,
    /// Attempts started so far (incremented on claim)
    pub attempts: u32,
    pub max_attempts: u32,
    pub backoff: Vec<u64>,
    pub available_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

impl QueuedJob {
    pub fn new(
        event_id: &str,
        listener: &str,
        payload_json: String,
        policy: &RetryPolicy,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            listener: listener.to_string(),
            payload_json,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: policy.max_attempts,
            backoff: policy.backoff_seconds.clone(),
            available_at: now,
            created_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// The policy frozen into the job at enqueue time
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff.clone())
    }

    pub fn can_retry(&self) -> bool {
        self.retry_policy().has_attempts_left(self.attempts)
    }
}

/// Dead-letter row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedJob {
    pub failed_id: String,
    pub job_id: String,
    pub event_id: String,
    pub listener: String,
    pub payload_json: String,
    pub attempts: u32,
    pub error_message: String,
    pub failed_at: NaiveDateTime,
    pub retried_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending_count: u32,
    pub running_count: u32,
    pub completed_count: u32,
    pub failed_count: u32,
    pub cancelled_count: u32,
    /// failed_jobs rows not yet retried
    pub dead_letter_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_retry_tracks_attempts() {
        let now = crate::db::now_ts();
        let mut job = QueuedJob::new("e1", "l1", "{}".to_string(), &RetryPolicy::new(2, vec![5]), now);
        assert!(job.can_retry());
        job.attempts = 2;
        assert!(!job.can_retry());
        assert_eq!(job.retry_policy().delay_for_attempt(2), 5);
    }
}
