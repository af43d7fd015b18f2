//! One connection to the joystick server: receive snapshots, drive the
//! actuators.

use std::time::Duration;

use futures_util::{FutureExt, StreamExt};
use joybridge_shared::{JoystickSnapshot, SnapshotCodec};
use tokio::{io::AsyncRead, net::TcpStream, time::timeout};
use tokio_util::{codec::FramedRead, sync::CancellationToken};

use crate::{
    actuator::Actuators,
    config::{ClientConfig, ControlMapping},
    domain::{ColorScheme, fan_speed_from_axis},
    error::ClientError,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a session ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Shutdown was requested (SIGINT / SIGTERM)
    Cancelled,
    /// The server closed the stream
    ServerClosed,
}

/// Actuator calls that succeeded for one snapshot
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AppliedActions {
    pub fan_speed: Option<u8>,
    pub color_scheme: Option<ColorScheme>,
}

/// Open the TCP connection to the server
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    let addr = format!("{}:{}", host, port);
    match timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ClientError::Connection { addr, source }),
        Err(_) => Err(ClientError::Connection {
            addr,
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"),
        }),
    }
}

/// Drive the actuators for one snapshot.
///
/// Blocks while the external commands run. The color scheme is only set when
/// it differs from `current_scheme`, the last scheme applied successfully.
/// Actuator failures are logged and otherwise ignored so the next snapshot
/// gets a fresh attempt.
pub fn apply_snapshot(
    snapshot: &JoystickSnapshot,
    mapping: &ControlMapping,
    actuators: &Actuators,
    current_scheme: Option<ColorScheme>,
) -> AppliedActions {
    let mut applied = AppliedActions::default();

    if let Some(value) = snapshot.axis(mapping.axis) {
        let percent = fan_speed_from_axis(value);
        tracing::debug!("Setting fan speed: {}% (axis {} = {})", percent, mapping.axis, value);
        match actuators.fan.set_fan_speed(mapping.gpu, percent) {
            Ok(()) => applied.fan_speed = Some(percent),
            Err(e) => tracing::warn!("Failed to set fan speed: {}", e),
        }
    }

    if let Some(pressed) = snapshot.button(mapping.button) {
        let scheme = ColorScheme::from_pressed(pressed);
        if current_scheme != Some(scheme) {
            tracing::debug!("Setting color scheme: {}", scheme);
            match actuators.color_scheme.set_color_scheme(scheme) {
                Ok(()) => applied.color_scheme = Some(scheme),
                Err(e) => tracing::warn!("Failed to set color scheme: {}", e),
            }
        }
    }

    applied
}

/// Receive frames from `reader` until the stream ends, fails, or `cancel`
/// fires.
///
/// Frames that queued up while the actuators were busy are stale: only the
/// newest one already buffered is applied. `cancel` also interrupts a
/// running actuator call.
pub async fn receive_loop<R>(
    reader: R,
    mapping: &ControlMapping,
    actuators: &Actuators,
    cancel: &CancellationToken,
) -> Result<SessionEnd, ClientError>
where
    R: AsyncRead + Unpin,
{
    let mut frames = FramedRead::new(reader, SnapshotCodec::new());
    let mut color_scheme = None;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            frame = frames.next() => frame,
        };
        let mut snapshot = match frame {
            Some(Ok(snapshot)) => snapshot,
            Some(Err(e)) => return Err(e.into()),
            None => {
                tracing::info!("Server closed the connection");
                return Ok(SessionEnd::ServerClosed);
            }
        };

        let mut end: Option<Result<SessionEnd, ClientError>> = None;
        let mut skipped = 0usize;
        while let Some(next) = frames.next().now_or_never() {
            match next {
                Some(Ok(newer)) => {
                    snapshot = newer;
                    skipped += 1;
                }
                Some(Err(e)) => {
                    end = Some(Err(e.into()));
                    break;
                }
                None => {
                    tracing::info!("Server closed the connection");
                    end = Some(Ok(SessionEnd::ServerClosed));
                    break;
                }
            }
        }
        if skipped > 0 {
            tracing::debug!("Skipped {} stale snapshot(s)", skipped);
        }

        let actuators = actuators.clone();
        let mapping = *mapping;
        let current = color_scheme;
        let task = tokio::task::spawn_blocking(move || {
            apply_snapshot(&snapshot, &mapping, &actuators, current)
        });
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Shutdown requested while actuator commands were running");
                return Ok(SessionEnd::Cancelled);
            }
            joined = task => match joined {
                Ok(applied) => {
                    if applied.color_scheme.is_some() {
                        color_scheme = applied.color_scheme;
                    }
                }
                Err(e) => tracing::error!("Actuator task failed: {}", e),
            }
        }

        if let Some(end) = end {
            return end;
        }
    }
}

/// Connect to the server and run the receive loop
pub async fn run_client_session(
    config: &ClientConfig,
    actuators: &Actuators,
    cancel: &CancellationToken,
) -> Result<SessionEnd, ClientError> {
    let stream = tokio::select! {
        _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
        stream = connect(&config.host, config.port) => stream?,
    };
    tracing::info!("Connected to joystick server at {}", config.server_addr());

    receive_loop(stream, &config.mapping, actuators, cancel).await
}
