use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Size of the frame length prefix.
pub const LENGTH_SIZE: usize = 4;

/// Size of the message identifier that opens every frame body.
pub const ID_SIZE: usize = 4;

/// Default maximum frame size (identifier + payload): 1 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// One frame as it came off the wire, before the registry resolves its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Message identifier.
    pub id: u32,
    /// Encoded message fields.
    pub payload: Bytes,
}

impl RawFrame {
    pub fn new(id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (length prefix + id + payload).
    pub fn wire_size(&self) -> usize {
        LENGTH_SIZE + ID_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────┐
/// │ Length (4B)  │ Message id   │ Payload          │
/// │ big-endian   │ (4B BE)      │ (Length - 4 B)   │
/// └──────────────┴──────────────┴──────────────────┘
/// ```
///
/// `Length` counts the message id plus the payload.
pub fn encode_frame(id: u32, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let body = ID_SIZE + payload.len();
    if body > u32::MAX as usize {
        return Err(FrameError::FrameTooLarge {
            size: body,
            max: u32::MAX as usize,
        });
    }
    dst.reserve(LENGTH_SIZE + body);
    dst.put_u32(body as u32);
    dst.put_u32(id);
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from an accumulation buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly one frame's bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_frame_size: usize) -> Result<Option<RawFrame>> {
    if src.len() < LENGTH_SIZE {
        return Ok(None); // Need more data
    }

    let declared = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
    let body = declared as usize;

    if body < ID_SIZE {
        return Err(FrameError::MalformedFrame(declared));
    }
    if body > max_frame_size {
        return Err(FrameError::FrameTooLarge {
            size: body,
            max: max_frame_size,
        });
    }

    if src.len() < LENGTH_SIZE + body {
        src.reserve(LENGTH_SIZE + body - src.len());
        return Ok(None); // Need more data
    }

    src.advance(LENGTH_SIZE);
    let id = src.get_u32();
    let payload = src.split_to(body - ID_SIZE).freeze();

    Ok(Some(RawFrame { id, payload }))
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame size (id + payload) in bytes. Default: 1 MiB.
    pub max_frame_size: usize,
    /// Upper bound for flushing one outbound buffer. Default: 10 s.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            write_timeout: Some(Duration::from_secs(10)),
        }
    }
}
