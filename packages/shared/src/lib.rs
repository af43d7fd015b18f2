//! Shared building blocks for the Joybridge server and client.
//!
//! - [`snapshot`]: the joystick state exchanged on the wire
//! - [`codec`]: newline-delimited JSON framing for that state
//! - [`logger`]: tracing subscriber setup used by both binaries
//! - [`signal`]: SIGINT / SIGTERM handling

pub mod codec;
pub mod error;
pub mod logger;
pub mod signal;
pub mod snapshot;

pub use codec::{SnapshotCodec, encode_frame};
pub use error::ProtocolError;
pub use snapshot::JoystickSnapshot;
