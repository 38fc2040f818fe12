// ==========================================
// VitalVida Sync Pipeline - queue worker
// ==========================================
// Loop: recover stale -> dequeue -> listener.handle
// Ok         -> COMPLETED
// Retryable  -> PENDING again after backoff (while attempts remain)
// otherwise  -> FAILED + failed_jobs + listener.failed()
// ==========================================

use crate::db::now_ts;
use crate::events::EventEnvelope;
use crate::listeners::{ListenerError, ListenerRegistry};
use crate::queue::error::QueueResult;
use crate::queue::job::QueuedJob;
use crate::queue::job_queue::JobQueue;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// What happened to one claimed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { job_id: String },
    Retrying { job_id: String, delay_seconds: u64 },
    Failed { job_id: String, failed_id: String },
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed { job_id }
            | JobOutcome::Retrying { job_id, .. }
            | JobOutcome::Failed { job_id, .. } => job_id,
        }
    }
}

pub struct QueueWorker {
    queue: Arc<JobQueue>,
    registry: Arc<ListenerRegistry>,
    poll_interval: Duration,
    stale_after: chrono::Duration,
}

impl QueueWorker {
    pub fn new(
        queue: Arc<JobQueue>,
        registry: Arc<ListenerRegistry>,
        poll_interval: Duration,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            queue,
            registry,
            poll_interval,
            stale_after,
        }
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    pub async fn process_next(&self) -> QueueResult<Option<JobOutcome>> {
        self.process_next_at(now_ts()).await
    }

    /// Claim and run one job due at `now`
    pub async fn process_next_at(&self, now: NaiveDateTime) -> QueueResult<Option<JobOutcome>> {
        let Some(job) = self.queue.dequeue(now)? else {
            return Ok(None);
        };
        self.execute(job, now).await.map(Some)
    }

    pub async fn process_all(&self) -> QueueResult<Vec<JobOutcome>> {
        self.process_all_at(now_ts()).await
    }

    /// Drain every job due at `now`; retries scheduled later are left queued
    pub async fn process_all_at(&self, now: NaiveDateTime) -> QueueResult<Vec<JobOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.process_next_at(now).await? {
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Poll until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            poll_ms = self.poll_interval.as_millis() as u64,
            listeners = ?self.registry.names(),
            "queue worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.queue.recover_stale(now_ts(), self.stale_after) {
                tracing::error!(error = %e, "stale job recovery failed");
            }

            match self.process_all().await {
                Ok(outcomes) if !outcomes.is_empty() => {
                    tracing::debug!(processed = outcomes.len(), "queue tick");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "queue tick failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("queue worker stopped");
    }

    async fn execute(&self, job: QueuedJob, now: NaiveDateTime) -> QueueResult<JobOutcome> {
        let envelope: EventEnvelope = match serde_json::from_str(&job.payload_json) {
            Ok(envelope) => envelope,
            Err(e) => {
                let message = format!("undecodable payload: {}", e);
                return self.fail(&job, &message, None, now).await;
            }
        };

        let Some(listener) = self.registry.get(&job.listener) else {
            let message = format!("no listener registered as {}", job.listener);
            return self.fail(&job, &message, Some(&envelope), now).await;
        };

        // a stale recovery may push attempts past the limit
        if job.attempts > job.max_attempts {
            let message = format!("attempts exhausted ({}/{})", job.attempts, job.max_attempts);
            let error = ListenerError::Permanent(message.clone());
            return self
                .fail_with_hook(&job, &error, &envelope, listener.as_ref(), now)
                .await;
        }

        tracing::debug!(
            job_id = %job.job_id,
            event_id = %job.event_id,
            listener = %job.listener,
            attempt = job.attempts,
            "running listener"
        );

        match listener.handle(&envelope).await {
            Ok(()) => {
                self.queue.complete(&job.job_id, now)?;
                tracing::info!(
                    job_id = %job.job_id,
                    event_id = %job.event_id,
                    listener = %job.listener,
                    "job completed"
                );
                Ok(JobOutcome::Completed { job_id: job.job_id })
            }
            Err(error) if error.is_retryable() && job.can_retry() => {
                let delay = job.retry_policy().delay_for_attempt(job.attempts);
                self.queue
                    .release_for_retry(&job.job_id, &error.to_string(), delay, now)?;
                tracing::warn!(
                    job_id = %job.job_id,
                    listener = %job.listener,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_seconds = delay,
                    error = %error,
                    "listener failed, retry scheduled"
                );
                Ok(JobOutcome::Retrying {
                    job_id: job.job_id,
                    delay_seconds: delay,
                })
            }
            Err(error) => {
                self.fail_with_hook(&job, &error, &envelope, listener.as_ref(), now)
                    .await
            }
        }
    }

    async fn fail_with_hook(
        &self,
        job: &QueuedJob,
        error: &ListenerError,
        envelope: &EventEnvelope,
        listener: &dyn crate::listeners::EventListener,
        now: NaiveDateTime,
    ) -> QueueResult<JobOutcome> {
        let outcome = self.fail(job, &error.to_string(), Some(envelope), now).await?;
        if let Err(hook_error) = listener.failed(envelope, error).await {
            tracing::error!(
                job_id = %job.job_id,
                listener = %job.listener,
                error = %hook_error,
                "failed() hook errored"
            );
        }
        Ok(outcome)
    }

    async fn fail(
        &self,
        job: &QueuedJob,
        message: &str,
        envelope: Option<&EventEnvelope>,
        now: NaiveDateTime,
    ) -> QueueResult<JobOutcome> {
        let failed_id = self.queue.mark_failed(&job.job_id, message, now)?;
        tracing::error!(
            job_id = %job.job_id,
            event_id = %job.event_id,
            listener = %job.listener,
            attempts = job.attempts,
            da_code = envelope.map(|e| e.event.da_code()).unwrap_or("-"),
            error = %message,
            "job failed permanently"
        );
        Ok(JobOutcome::Failed {
            job_id: job.job_id.clone(),
            failed_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::events::{DomainEvent, EventKind};
    use crate::listeners::EventListener;
    use crate::queue::job::JobStatus;
    use crate::queue::retry::RetryPolicy;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails with the given error until `succeed_on` attempts have been made
    struct FlakyListener {
        calls: AtomicU32,
        succeed_on: u32,
        retryable: bool,
        failed_calls: AtomicU32,
    }

    #[async_trait]
    impl EventListener for FlakyListener {
        fn name(&self) -> &str {
            "flaky"
        }

        fn subscribes_to(&self) -> EventKind {
            EventKind::AgentUpdated
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::new(3, vec![10, 30])
        }

        async fn handle(&self, _envelope: &EventEnvelope) -> Result<(), ListenerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.succeed_on {
                Ok(())
            } else if self.retryable {
                Err(ListenerError::Retryable("role db busy".to_string()))
            } else {
                Err(ListenerError::Permanent("agent not found".to_string()))
            }
        }

        async fn failed(
            &self,
            _envelope: &EventEnvelope,
            _error: &ListenerError,
        ) -> Result<(), ListenerError> {
            self.failed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn setup(listener: Arc<FlakyListener>) -> (QueueWorker, Arc<JobQueue>, String) {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let queue = Arc::new(JobQueue::new(conn));
        let mut registry = ListenerRegistry::new();
        registry.register(listener.clone());

        let envelope = EventEnvelope::new(
            DomainEvent::AgentUpdated {
                agent_id: "a1".to_string(),
                da_code: "DA-0001".to_string(),
                changed_fields: vec!["phone".to_string()],
            },
            "test",
        );
        let job = QueuedJob::new(
            &envelope.event_id,
            "flaky",
            serde_json::to_string(&envelope).unwrap(),
            &listener.retry_policy(),
            now_ts(),
        );
        let job_id = queue.enqueue(&job).unwrap();

        let worker = QueueWorker::new(
            queue.clone(),
            Arc::new(registry),
            Duration::from_millis(10),
            chrono::Duration::seconds(300),
        );
        (worker, queue, job_id)
    }

    fn flaky(succeed_on: u32, retryable: bool) -> Arc<FlakyListener> {
        Arc::new(FlakyListener {
            calls: AtomicU32::new(0),
            succeed_on,
            retryable,
            failed_calls: AtomicU32::new(0),
        })
    }

    #[tokio::test]
    async fn test_retryable_error_backs_off_then_succeeds() {
        let listener = flaky(2, true);
        let (worker, queue, job_id) = setup(listener.clone());
        let now = now_ts();

        let first = worker.process_next_at(now).await.unwrap().unwrap();
        assert_eq!(
            first,
            JobOutcome::Retrying {
                job_id: job_id.clone(),
                delay_seconds: 10
            }
        );
        assert!(worker.process_next_at(now).await.unwrap().is_none());

        let later = now + chrono::Duration::seconds(10);
        let second = worker.process_next_at(later).await.unwrap().unwrap();
        assert_eq!(second, JobOutcome::Completed { job_id: job_id.clone() });
        assert_eq!(queue.get(&job_id).unwrap().unwrap().status, JobStatus::Completed);
        assert_eq!(listener.failed_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_run_failed_hook() {
        let listener = flaky(u32::MAX, true);
        let (worker, queue, job_id) = setup(listener.clone());
        let mut now = now_ts();

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            let outcome = worker.process_next_at(now).await.unwrap().unwrap();
            if let JobOutcome::Retrying { delay_seconds, .. } = &outcome {
                now += chrono::Duration::seconds(*delay_seconds as i64);
            }
            outcomes.push(outcome);
        }

        assert!(matches!(outcomes[0], JobOutcome::Retrying { delay_seconds: 10, .. }));
        assert!(matches!(outcomes[1], JobOutcome::Retrying { delay_seconds: 30, .. }));
        assert!(matches!(outcomes[2], JobOutcome::Failed { .. }));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 3);
        assert_eq!(listener.failed_calls.load(Ordering::SeqCst), 1);

        let job = queue.get(&job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(queue.list_failed(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let listener = flaky(u32::MAX, false);
        let (worker, _queue, _job_id) = setup(listener.clone());

        let outcomes = worker.process_all().await.unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], JobOutcome::Failed { .. }));
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);
        assert_eq!(listener.failed_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_listener_is_dead_lettered() {
        let conn = Arc::new(Mutex::new(open_in_memory().unwrap()));
        let queue = Arc::new(JobQueue::new(conn));
        let job = QueuedJob::new("evt-x", "ghost", "{}".to_string(), &RetryPolicy::once(), now_ts());
        queue.enqueue(&job).unwrap();

        let worker = QueueWorker::new(
            queue.clone(),
            Arc::new(ListenerRegistry::new()),
            Duration::from_millis(10),
            chrono::Duration::seconds(300),
        );
        let outcome = worker.process_next().await.unwrap().unwrap();
        assert!(matches!(outcome, JobOutcome::Failed { .. }));
        assert_eq!(queue.stats().unwrap().dead_letter_count, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let listener = flaky(1, true);
        let (worker, queue, job_id) = setup(listener);
        let (tx, rx) = watch::channel(false);

        let worker = Arc::new(worker);
        let handle = {
            let worker = worker.clone();
            tokio::spawn(async move { worker.run(rx).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(queue.get(&job_id).unwrap().unwrap().status, JobStatus::Completed);
    }
}
