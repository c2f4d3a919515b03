//! Error types for qp-mf

use thiserror::Error;

/// Manifest store error
#[derive(Debug, Error)]
pub enum ManifestError {
    /// `init` on a coordinate that already has a node
    #[error("Manifest node already exists: {0}")]
    AlreadyExists(String),

    /// No node stored at the coordinate
    #[error("Manifest node not found: {0}")]
    NotFound(String),

    /// Leaf-only mutation attempted on an aggregate node
    #[error("Not a leaf node: {0} (status of aggregate nodes is derived from children)")]
    NotALeaf(String),

    /// Malformed or incomplete coordinate
    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Node saved under a coordinate other than its own
    #[error("Coordinate mismatch: node for {found} saved at {expected}")]
    CoordinateMismatch { expected: String, found: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest document could not be encoded or decoded
    #[error("Manifest document error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// qp-common error
    #[error("Common error: {0}")]
    Common(#[from] qp_common::Error),
}

/// Result type for manifest operations
pub type Result<T> = std::result::Result<T, ManifestError>;
