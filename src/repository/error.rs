// ==========================================
// VitalVida Sync Pipeline - repository errors
// ==========================================
// Tool: thiserror derive
// ==========================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== database =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("database lock poisoned: {0}")]
    LockError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("unique constraint violated: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    // ===== business rules =====
    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ===== data quality =====
    #[error("validation failed: {0}")]
    ValidationError(String),

    #[error("bad stored value (field={field}): {message}")]
    FieldValueError { field: String, message: String },

    // ===== generic =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        RepositoryError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            rusqlite::Error::FromSqlConversionFailure(_, _, inner) => RepositoryError::FieldValueError {
                field: "unknown".to_string(),
                message: inner.to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::FieldValueError {
            field: "json".to_string(),
            message: err.to_string(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
