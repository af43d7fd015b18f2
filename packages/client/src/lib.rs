//! Joystick control client.
//!
//! Connects to the joystick broadcast server, maps one axis to GPU fan speed
//! and one button to the desktop color scheme, and hands the fan back to
//! automatic control on exit.

pub mod actuator;
pub mod command;
pub mod config;
pub mod domain;
pub mod error;
pub mod guard;
pub mod runner;
pub mod session;

pub use actuator::{Actuators, ColorSchemeControl, FanControl, GnomeColorScheme, NvidiaSettings};
pub use command::{CommandRunner, DesktopUserRunner, DirectRunner};
pub use config::{ClientConfig, ControlMapping};
pub use error::{ActuatorError, ClientError};
pub use runner::run_client;
