//! Joystick broadcast server.
//!
//! Reads `jstest` output, keeps the newest decoded snapshot and pushes it to
//! every connected TCP client on a fixed tick.

pub mod decoder;
pub mod device;
pub mod error;
pub mod queue;
pub mod registry;
pub mod server;

pub use decoder::decode_line;
pub use device::{DeviceCommand, DeviceReader};
pub use error::{DeviceError, ServerError};
pub use queue::SnapshotSlot;
pub use registry::{BroadcastReport, ClientConnection, ClientId, ClientRegistry};
pub use server::{BroadcastServer, ServerConfig};
