//! Error types for the broadcast server.

use thiserror::Error;

/// Failures of the joystick reporting subprocess
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device command could not be started
    #[error("Failed to start device reader '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The subprocess was started without a stdout pipe
    #[error("Device reader has no stdout")]
    MissingStdout,

    /// Reading the report stream failed
    #[error("Failed to read device output: {0}")]
    Read(#[source] std::io::Error),

    /// The report stream closed; no more snapshots can be produced
    #[error("Device reader exited")]
    StreamEnded,

    /// The reader task panicked or was aborted
    #[error("Device reader task failed: {0}")]
    Task(String),
}

/// Server-level errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The device reader stopped; fatal for the server
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
