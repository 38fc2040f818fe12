// ==========================================
// VitalVida Sync Pipeline - config errors
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config lock poisoned: {0}")]
    LockError(String),

    #[error("config database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("config snapshot is not valid JSON: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("invalid config value (key={key}, value={value}): {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;
