//! Error types for bargain

use thiserror::Error;

/// Main error type for bargain
///
/// Negotiation transitions never produce errors: every protocol failure
/// resolves into a state transition plus a status message. Errors exist
/// only at the boundary (configuration, dispatch IO, message codec).
#[derive(Error, Debug)]
pub enum BargainError {
    // Dispatch errors
    #[error("Dispatch connection error: {0}")]
    DispatchConnection(String),

    #[error("Dispatch stream closed")]
    DispatchClosed,

    #[error("Malformed inbound message: {0}")]
    MalformedMessage(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfig(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for bargain operations
pub type Result<T> = std::result::Result<T, BargainError>;
