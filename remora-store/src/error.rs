//! Error types for the store layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `replace` and `update` are mutually exclusive merge strategies.
    #[error("replace and update are mutually exclusive save strategies")]
    ReplaceUpdateConflict,

    /// No schema registered for the entity type.
    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    /// A partial-update payload must be a JSON object.
    #[error("partial update payload must be a JSON object")]
    InvalidPartial,

    /// Incompatible shapes met during a nested merge; the offending branch
    /// is abandoned, the rest of the merge proceeds.
    #[error("merge conflict on field `{field}`: {reason}")]
    MergeConflict { field: String, reason: String },

    /// Record materialization error.
    #[error(transparent)]
    Model(#[from] remora_model::ModelError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
