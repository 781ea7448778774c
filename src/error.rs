//! Error types for logpipe

use thiserror::Error;

/// Errors that can occur inside the log pipeline
///
/// None of these ever cross the `emit` boundary — the pipeline degrades
/// to console output instead. They surface only from store
/// implementations, explicit flush calls, and component constructors.
#[derive(Debug, Error)]
pub enum LogError {
    /// Persistence backend failure (transient or otherwise)
    #[error("Store error: {reason}")]
    Store { reason: String },

    /// Write rejected because the circuit breaker is open
    #[error("Circuit open: write to '{store}' not attempted")]
    CircuitOpen { store: String },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Redaction pattern failed to compile
    #[error("Redaction pattern error: {0}")]
    Pattern(String),
}

impl LogError {
    /// Build a store error from any displayable cause
    pub fn store(reason: impl std::fmt::Display) -> Self {
        Self::Store {
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LogError>;
