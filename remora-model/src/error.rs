//! Error types for the model layer.

use thiserror::Error;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur when materializing records.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A record payload must be a JSON object.
    #[error("record payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
