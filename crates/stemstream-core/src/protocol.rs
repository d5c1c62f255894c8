//! Wire protocol
//!
//! Every request starts with a 4-byte little-endian `u32` header:
//!
//! | Header       | Request   | Body                    | Response                         |
//! |--------------|-----------|-------------------------|----------------------------------|
//! | `0`          | heartbeat | none                    | `u32` frames available to pull   |
//! | `0xFFFFFFFF` | pull      | none                    | `u32` count `k`, then `k` frames |
//! | `n`          | push      | `n` frames              | `u32` `n` (acknowledgement)      |
//!
//! Frames travel as interleaved little-endian `f32` (left, right). There is
//! no error frame: a protocol violation closes the connection.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::types::{Frame, CHANNELS};

/// Header value of a heartbeat request
pub const HEARTBEAT: u32 = 0;

/// Header value of a pull request
pub const PULL: u32 = u32::MAX;

/// Bytes per sample on the wire
pub const BYTES_PER_SAMPLE: usize = 4;

/// Bytes per frame on the wire
pub const BYTES_PER_FRAME: usize = CHANNELS * BYTES_PER_SAMPLE;

/// Errors that end a connection
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Connection closed after {received} of 4 header bytes")]
    TruncatedHeader { received: usize },

    #[error("Connection closed after {received} of {expected} payload bytes")]
    ShortPayload { expected: u64, received: u64 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A decoded request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Ask how many processed frames are waiting
    Heartbeat,
    /// Fetch a batch of processed frames
    Pull,
    /// Send this many frames of audio
    Push { frames: u32 },
}

impl Request {
    pub fn from_header(header: u32) -> Self {
        match header {
            HEARTBEAT => Self::Heartbeat,
            PULL => Self::Pull,
            frames => Self::Push { frames },
        }
    }

    /// Payload size that follows the header
    pub fn payload_len(&self) -> u64 {
        match self {
            Self::Push { frames } => *frames as u64 * BYTES_PER_FRAME as u64,
            _ => 0,
        }
    }
}

/// Read the next request header
///
/// Returns `Ok(None)` on a clean end of stream before the first header byte.
pub fn read_request<R: Read>(reader: &mut R) -> Result<Option<Request>, ProtocolError> {
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ProtocolError::TruncatedHeader { received: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(Some(Request::from_header(u32::from_le_bytes(header))))
}

/// Read a push payload of `frames` frames
///
/// The buffer grows with the bytes actually received, so an oversized header
/// from a misbehaving peer does not allocate up front. A short payload is an
/// error and nothing is returned.
pub fn read_frames<R: Read>(reader: &mut R, frames: u32) -> Result<Vec<Frame>, ProtocolError> {
    let expected = frames as u64 * BYTES_PER_FRAME as u64;
    let mut payload = Vec::new();
    reader.by_ref().take(expected).read_to_end(&mut payload)?;

    if (payload.len() as u64) < expected {
        return Err(ProtocolError::ShortPayload {
            expected,
            received: payload.len() as u64,
        });
    }
    Ok(decode_frames(&payload))
}

/// Decode interleaved little-endian `f32` pairs; a trailing partial frame is ignored
pub fn decode_frames(bytes: &[u8]) -> Vec<Frame> {
    bytes
        .chunks_exact(BYTES_PER_FRAME)
        .map(|frame| {
            let left = f32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
            let right = f32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]);
            Frame::new(left, right)
        })
        .collect()
}

/// Append frames as interleaved little-endian `f32`
pub fn encode_frames(frames: &[Frame], out: &mut Vec<u8>) {
    out.reserve(frames.len() * BYTES_PER_FRAME);
    for frame in frames {
        out.extend_from_slice(&frame.left.to_le_bytes());
        out.extend_from_slice(&frame.right.to_le_bytes());
    }
}

/// Write a bare `u32` count reply
pub fn write_count<W: Write>(writer: &mut W, count: u32) -> io::Result<()> {
    writer.write_all(&count.to_le_bytes())
}

/// Write a pull reply (count followed by frames) in one write
pub fn write_frames<W: Write>(writer: &mut W, frames: &[Frame]) -> io::Result<()> {
    let mut reply = Vec::with_capacity(4 + frames.len() * BYTES_PER_FRAME);
    reply.extend_from_slice(&(frames.len() as u32).to_le_bytes());
    encode_frames(frames, &mut reply);
    writer.write_all(&reply)
}

/// Saturating conversion for counts that go on the wire
pub fn wire_count(count: usize) -> u32 {
    count.min((PULL - 1) as usize) as u32
}
