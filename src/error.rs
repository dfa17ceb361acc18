//! Error types for gazejoin.
//!
//! Empty matches are not errors. They surface as `None` labels or
//! undefined aggregates in the results.

use thiserror::Error;

/// Result type for join, load and export operations.
pub type Result<T> = std::result::Result<T, JoinError>;

/// Errors that can occur while joining event and sample tables.
#[derive(Error, Debug)]
pub enum JoinError {
    /// A required column is missing or has an unusable type
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A parameter is outside its valid domain
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// I/O error while reading or writing a table
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed CSV input
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl JoinError {
    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        JoinError::InvalidSchema(format!("{table} table has no column '{column}'"))
    }
}
