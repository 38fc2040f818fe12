// ==========================================
// VitalVida Sync Pipeline - queue layer
// ==========================================
// Responsibility: durable per-listener jobs, retries with
//                 backoff, dead letters, the worker loop
// ==========================================

pub mod error;
pub mod job;
pub mod job_queue;
pub mod retry;
pub mod worker;

pub use error::{QueueError, QueueResult};
pub use job::{FailedJob, JobStatus, QueueStats, QueuedJob};
pub use job_queue::JobQueue;
pub use retry::RetryPolicy;
pub use worker::{JobOutcome, QueueWorker};
