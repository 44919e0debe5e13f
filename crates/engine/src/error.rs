use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures the engine surfaces to its callers.
///
/// Unreadable or malformed persisted state is deliberately absent here: the
/// store recovers from it locally by starting from a fresh default document.
/// Write failures are the opposite case and must never be swallowed, since a
/// dropped save would break the durability the caller was promised.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to persist policy state: {0}")]
    StorageWrite(#[from] io::Error),

    #[error("failed to encode policy state: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable category for adapter-level error payloads.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid-input",
            EngineError::StorageWrite(_) | EngineError::Encode(_) => "storage-write",
            EngineError::Internal(_) => "internal",
        }
    }
}
