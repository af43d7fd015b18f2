//! The joystick reporting subprocess and the producer task that feeds the
//! [`SnapshotSlot`].

use std::{process::Stdio, sync::Arc};

use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, ChildStderr, Command},
};
use tokio_util::{
    codec::{Decoder, FramedRead},
    sync::CancellationToken,
};

use crate::{decoder::decode_line, error::DeviceError, queue::SnapshotSlot};

/// Default joystick device node
pub const DEFAULT_DEVICE_PATH: &str = "/dev/input/js0";

const MAX_REPORT_LENGTH: usize = 8 * 1024;

/// Program and arguments producing the device report stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl DeviceCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `jstest <device_path>`
    pub fn jstest(device_path: &str) -> Self {
        Self::new("jstest", vec![device_path.to_string()])
    }
}

impl Default for DeviceCommand {
    fn default() -> Self {
        Self::jstest(DEFAULT_DEVICE_PATH)
    }
}

/// Splits the report stream into lines.
///
/// jstest redraws its status line in place with `\r`, so both `\r` and `\n`
/// end a line. Blank lines are skipped and bytes are decoded lossily.
#[derive(Debug, Clone)]
pub struct ReportLineCodec {
    max_length: usize,
}

impl ReportLineCodec {
    pub fn new() -> Self {
        Self {
            max_length: MAX_REPORT_LENGTH,
        }
    }
}

impl Default for ReportLineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ReportLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let Some(end) = src.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                if src.len() > self.max_length {
                    tracing::warn!(
                        "Dropping {} bytes of device output without a line break",
                        src.len()
                    );
                    src.clear();
                }
                return Ok(None);
            };
            let line = src.split_to(end);
            src.advance(1);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        let rest = src.split_to(src.len());
        if rest.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

/// Read device reports until the stream ends, publishing every non-empty
/// decoded snapshot into `slot`.
///
/// The stream ending is reported as [`DeviceError::StreamEnded`]: without a
/// device no further snapshots can be produced.
pub async fn pump_reports<R>(reader: R, slot: &SnapshotSlot) -> Result<(), DeviceError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, ReportLineCodec::new());
    while let Some(line) = lines.next().await {
        let line = line.map_err(DeviceError::Read)?;
        let snapshot = decode_line(&line);
        if snapshot.is_empty() {
            tracing::trace!("Ignoring device line: {}", line.trim());
            continue;
        }
        if slot.publish(snapshot) {
            tracing::trace!("Replaced unsent snapshot");
        }
    }
    Err(DeviceError::StreamEnded)
}

/// Owns the reporting subprocess for the lifetime of the server.
pub struct DeviceReader {
    command: DeviceCommand,
    slot: Arc<SnapshotSlot>,
}

impl DeviceReader {
    pub fn new(command: DeviceCommand, slot: Arc<SnapshotSlot>) -> Self {
        Self { command, slot }
    }

    /// Spawn the subprocess and pump its output until it ends or `cancel`
    /// fires. The subprocess is terminated in both cases.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DeviceError> {
        let mut child = self.spawn()?;
        let stdout = child.stdout.take().ok_or(DeviceError::MissingStdout)?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr));
        }

        let result = tokio::select! {
            result = pump_reports(stdout, &self.slot) => result,
            _ = cancel.cancelled() => Ok(()),
        };

        terminate(&mut child).await;
        result
    }

    fn spawn(&self) -> Result<Child, DeviceError> {
        let child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DeviceError::Spawn {
                program: self.command.program.clone(),
                source,
            })?;
        tracing::info!(
            "Started device reader: {} {} (pid {:?})",
            self.command.program,
            self.command.args.join(" "),
            child.id()
        );
        Ok(child)
    }
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        tracing::warn!("device: {}", line);
    }
}

async fn terminate(child: &mut Child) {
    match child.try_wait() {
        Ok(Some(status)) => {
            tracing::info!("Device reader exited with {}", status);
        }
        _ => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to terminate device reader: {}", e);
            } else {
                tracing::info!("Device reader terminated");
            }
        }
    }
}
