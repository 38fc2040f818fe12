// ==========================================
// VitalVida Sync Pipeline - queue operations API
// ==========================================
// Operator view of the job queue: counts, dead letters,
// manual retry and cancel.
// ==========================================

use std::sync::Arc;

use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::db::now_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::queue::{FailedJob, JobQueue, QueueStats, QueuedJob};
use crate::repository::ActionLogRepository;

pub struct QueueApi {
    queue: Arc<JobQueue>,
    action_log_repo: Arc<ActionLogRepository>,
}

impl QueueApi {
    pub fn new(queue: Arc<JobQueue>, action_log_repo: Arc<ActionLogRepository>) -> Self {
        Self {
            queue,
            action_log_repo,
        }
    }

    pub fn stats(&self) -> ApiResult<QueueStats> {
        Ok(self.queue.stats()?)
    }

    pub fn list_failed(&self, limit: i64) -> ApiResult<Vec<FailedJob>> {
        if limit <= 0 {
            return Err(ApiError::validation("limit", "must be greater than 0"));
        }
        Ok(self.queue.list_failed(limit)?)
    }

    /// Put a dead-lettered job back on the queue with a fresh attempt budget
    pub fn retry_failed(&self, failed_id: &str, actor: &str) -> ApiResult<QueuedJob> {
        let job_id = self.queue.retry_failed(failed_id, now_ts())?;
        let job = self
            .queue
            .get(&job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("QueuedJob (id={})", job_id)))?;

        let log = ActionLog::new(ActionType::JobRetried, actor)
            .with_event(&job.event_id)
            .with_detail(format!("job {} ({}) requeued from {}", job.job_id, job.listener, failed_id));
        self.action_log_repo.insert(&log)?;

        info!(%failed_id, job_id = %job.job_id, listener = %job.listener, actor, "dead-lettered job requeued");
        Ok(job)
    }

    /// Only PENDING jobs can be cancelled
    pub fn cancel(&self, job_id: &str) -> ApiResult<()> {
        let job = self.get_job(job_id)?;
        if !self.queue.cancel(job_id)? {
            return Err(ApiError::InvalidStateTransition {
                from: job.status.as_str().to_string(),
                to: "CANCELLED".to_string(),
            });
        }
        info!(%job_id, listener = %job.listener, "queued job cancelled");
        Ok(())
    }

    pub fn get_job(&self, job_id: &str) -> ApiResult<QueuedJob> {
        self.queue
            .get(job_id)?
            .ok_or_else(|| ApiError::NotFound(format!("QueuedJob (id={})", job_id)))
    }

    pub fn jobs_for_event(&self, event_id: &str) -> ApiResult<Vec<QueuedJob>> {
        Ok(self.queue.find_by_event(event_id)?)
    }
}
