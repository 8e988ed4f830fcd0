//! Unified error types for Convoke

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a completion service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompletionError {
    /// The call did not finish within its deadline
    #[error("Completion timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Network, auth or service-side failure
    #[error("Upstream completion failure: {0}")]
    Upstream(String),

    /// The service answered but the answer could not be read
    #[error("Unreadable completion response: {0}")]
    Parse(String),
}

/// Unified error type for all Convoke operations
#[derive(Error, Debug)]
pub enum ConvokeError {
    // Completion errors
    #[error(transparent)]
    Completion(#[from] CompletionError),

    // Resolution errors
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Unknown strategy '{name}'. Valid strategies: {valid}")]
    UnknownStrategy { name: String, valid: String },

    // Resource limits
    #[error("'{field}' too long ({len} chars). Maximum: {max}")]
    InputTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    // Persistence errors
    #[error("Invalid record id: {0}")]
    InvalidRecordId(String),

    #[error("Store error: {0}")]
    Store(String),

    // Registry errors
    #[error("Persona error: {0}")]
    Persona(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using ConvokeError
pub type Result<T> = std::result::Result<T, ConvokeError>;
