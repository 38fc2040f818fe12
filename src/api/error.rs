// ==========================================
// VitalVida Sync Pipeline - API errors
// ==========================================
// Responsibility: turn repository/queue errors into
//                 caller-facing errors with a status class
// 422 validation / 404 not found / 409 conflict / 500 internal
// ==========================================

use crate::events::PublishError;
use crate::queue::QueueError;
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One failed field check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub field: String,
    pub message: String,
}

impl ValidationViolation {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation failed: {}", summarize(.violations))]
    ValidationError { violations: Vec<ValidationViolation> },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("business rule violated: {0}")]
    BusinessRuleViolation(String),

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn summarize(violations: &[ValidationViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            violations: vec![ValidationViolation::new(field, message)],
        }
    }

    /// HTTP-style status class
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError { .. } => 422,
            ApiError::NotFound(_) => 404,
            ApiError::BusinessRuleViolation(_) | ApiError::InvalidStateTransition { .. } => 409,
            ApiError::DatabaseError(_) | ApiError::InternalError(_) | ApiError::Other(_) => 500,
        }
    }

    /// Message safe to show a caller; 500-class details stay in the log
    pub fn public_message(&self) -> String {
        if self.status_code() >= 500 {
            "internal error".to_string()
        } else {
            self.to_string()
        }
    }

    pub fn violations(&self) -> &[ValidationViolation] {
        match self {
            ApiError::ValidationError { violations } => violations,
            _ => &[],
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={})", entity, id))
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("duplicate: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("dangling reference: {}", msg))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            RepositoryError::ValidationError(msg) => ApiError::validation("record", msg),
            RepositoryError::FieldValueError { field, message } => ApiError::validation(&field, message),
            RepositoryError::LockError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => {
                tracing::error!(error = %msg, "repository failure");
                ApiError::DatabaseError(msg)
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::JobNotFound(id) => ApiError::NotFound(format!("job (id={})", id)),
            QueueError::InvalidState { id, status, expected } => ApiError::InvalidStateTransition {
                from: format!("{} ({})", status, id),
                to: expected,
            },
            other => {
                tracing::error!(error = %other, "queue failure");
                ApiError::DatabaseError(other.to_string())
            }
        }
    }
}

impl From<PublishError> for ApiError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Queue(e) => e.into(),
            PublishError::Other(e) => ApiError::Other(e),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
