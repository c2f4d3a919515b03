//! Error types for qp-lc

use crate::report::BatchReport;
use thiserror::Error;

/// Lifecycle engine error
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Generate targeted a coordinate that already holds questions
    #[error("{count} question(s) already stored at {coordinate}; use --force to append")]
    CoordinateOccupied { coordinate: String, count: i64 },

    /// A per-row precondition does not hold
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// All-or-nothing batch refused; nothing was applied
    #[error("Batch rejected with {} violation(s); no decisions applied", .0.failure_count())]
    BatchRejected(BatchReport),

    /// Malformed batch input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// qp-common error
    #[error("Common error: {0}")]
    Common(#[from] qp_common::Error),
}

/// Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
