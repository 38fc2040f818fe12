// ==========================================
// VitalVida Sync Pipeline - queue errors
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("queue lock poisoned: {0}")]
    LockError(String),

    #[error("queue database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("job payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("no listener registered under '{0}'")]
    UnknownListener(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {id} is {status}, expected {expected}")]
    InvalidState {
        id: String,
        status: String,
        expected: String,
    },
}

pub type QueueResult<T> = Result<T, QueueError>;
