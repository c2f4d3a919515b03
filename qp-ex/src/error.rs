//! Error types for qp-ex

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Working store missing
    #[error("Working store not found: {0}")]
    StoreNotFound(String),

    /// An approved row cannot be projected; the whole export is abandoned
    #[error("Approved question {id} in {table} cannot be exported: {reason}")]
    Consistency {
        table: String,
        id: i64,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Common error: {0}")]
    Common(#[from] qp_common::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
