//! Operation failure classification.
//!
//! This module decides, for a single failed server operation, whether the
//! node has stopped being the writable primary or is changing state, whether
//! the failed write or read may be resent, and whether a change stream may
//! resume after it.

pub mod classification;
pub mod codes;
pub mod detector;
pub mod resumability;

use thiserror::Error;

// Re-export main types for convenient access
pub use classification::{
    Classification, FailureSource, OperationFailure, OperationKind,
    NON_RESUMABLE_CHANGE_STREAM_ERROR, RESUMABLE_CHANGE_STREAM_ERROR, RETRYABLE_WRITE_ERROR,
    TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT,
};
pub use detector::{embedded_code, FailureClassifier};
pub use resumability::{is_resumable, is_resumable_with, RESUMABLE_LABEL_WIRE_VERSION};

/// Errors raised while decoding replies or loading classifier configuration.
///
/// Classification itself never fails.
#[derive(Error, Debug)]
pub enum FailureError {
    /// The reply document does not have the expected shape.
    #[error("invalid reply: {0}")]
    InvalidReply(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while reading input.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type for decoding and configuration.
pub type FailureResult<T> = Result<T, FailureError>;
