// ==========================================
// VitalVida Sync Pipeline - import errors
// ==========================================

use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum ImportError {
    // ===== file =====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: {0} (only .csv)")]
    UnsupportedFormat(String),

    #[error("file read failed: {0}")]
    FileReadError(#[from] std::io::Error),

    #[error("CSV parse failed: {0}")]
    CsvParseError(#[from] csv::Error),

    #[error("missing column(s): {0}")]
    MissingColumns(String),

    // ===== downstream =====
    /// A 500-class API error aborts the whole import
    #[error("import aborted at row {row}: {source}")]
    Aborted {
        row: usize,
        #[source]
        source: ApiError,
    },
}

pub type ImportResult<T> = Result<T, ImportError>;
