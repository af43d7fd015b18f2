//! Newline-delimited JSON framing for [`JoystickSnapshot`].
//!
//! Every frame is one compact JSON document followed by `\n`. The receiver
//! only consumes bytes up to a complete newline, so a document split across
//! several reads stays buffered and several documents arriving in one read
//! are yielded one by one.
//!
//! ```text
//! {"axes":{"0":-16500},"buttons":{"32":false}}\n
//! {"axes":{"0":-16000},"buttons":{"32":false}}\n
//! ```

use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{AnyDelimiterCodec, AnyDelimiterCodecError, Decoder, Encoder};

use crate::{error::ProtocolError, snapshot::JoystickSnapshot};

/// Upper bound for a single frame. Real snapshots are a few hundred bytes.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

/// tokio-util codec for snapshot frames.
///
/// Frames are split on raw bytes. Lines that are not valid snapshot
/// documents (invalid JSON or invalid UTF-8) are logged and skipped, so one
/// corrupt frame does not end the stream.
#[derive(Debug, Clone)]
pub struct SnapshotCodec {
    lines: AnyDelimiterCodec,
    max_frame_length: usize,
}

impl SnapshotCodec {
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_FRAME_LENGTH)
    }

    pub fn with_max_length(max_frame_length: usize) -> Self {
        Self {
            lines: AnyDelimiterCodec::new_with_max_length(
                b"\n".to_vec(),
                b"\n".to_vec(),
                max_frame_length,
            ),
            max_frame_length,
        }
    }

    fn convert(&self, err: AnyDelimiterCodecError) -> ProtocolError {
        match err {
            AnyDelimiterCodecError::MaxChunkLengthExceeded => ProtocolError::FrameTooLong {
                max: self.max_frame_length,
            },
            AnyDelimiterCodecError::Io(e) => ProtocolError::Io(e),
        }
    }
}

impl Default for SnapshotCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a single frame payload (without the trailing newline)
pub fn decode_frame(line: &[u8]) -> Result<JoystickSnapshot, ProtocolError> {
    Ok(serde_json::from_slice(line)?)
}

/// Serialize a snapshot into a complete frame, newline included
pub fn encode_frame(snapshot: &JoystickSnapshot) -> Result<Bytes, ProtocolError> {
    let mut dst = BytesMut::new();
    SnapshotCodec::new().encode(snapshot, &mut dst)?;
    Ok(dst.freeze())
}

fn accept_line(line: &[u8]) -> Option<JoystickSnapshot> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match decode_frame(line) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            tracing::warn!(
                "Discarding frame: {} (payload: {:?})",
                e,
                String::from_utf8_lossy(line)
            );
            None
        }
    }
}

impl Decoder for SnapshotCodec {
    type Item = JoystickSnapshot;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode(src) {
                Ok(Some(line)) => {
                    if let Some(snapshot) = accept_line(&line) {
                        return Ok(Some(snapshot));
                    }
                }
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.convert(e)),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode_eof(src) {
                Ok(Some(line)) => {
                    if let Some(snapshot) = accept_line(&line) {
                        return Ok(Some(snapshot));
                    }
                }
                Ok(None) => return Ok(None),
                Err(e) => return Err(self.convert(e)),
            }
        }
    }
}

impl Encoder<&JoystickSnapshot> for SnapshotCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &JoystickSnapshot, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json = serde_json::to_vec(item)?;
        if json.len() > self.max_frame_length {
            return Err(ProtocolError::FrameTooLong {
                max: self.max_frame_length,
            });
        }
        dst.reserve(json.len() + 1);
        dst.put_slice(&json);
        dst.put_u8(b'\n');
        Ok(())
    }
}
