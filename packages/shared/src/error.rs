//! Error types for the wire protocol.

use thiserror::Error;

/// Errors raised while framing or parsing wire messages
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Payload is not a valid snapshot document
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame grew past the configured limit without a terminating newline
    #[error("Frame exceeds {max} bytes without a newline")]
    FrameTooLong { max: usize },

    /// Underlying transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
