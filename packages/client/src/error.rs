//! Error types for the control client.

use std::time::Duration;

use joybridge_shared::ProtocolError;
use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server could not be reached
    #[error("Connection error: cannot reach {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The incoming stream could not be framed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The server closed the connection
    #[error("Connection lost")]
    ConnectionLost,
}

/// Failures of the external actuator commands
#[derive(Debug, Error)]
pub enum ActuatorError {
    /// The command is not installed on this host
    #[error("Command '{program}' not found")]
    NotFound { program: String },

    /// The command could not be started
    #[error("Failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but reported failure
    #[error("'{program}' failed with status {code:?}: {stderr}")]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The command hung and was killed
    #[error("'{program}' did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    /// The blocking task running the command panicked
    #[error("Actuator task failed: {0}")]
    Task(String),
}
