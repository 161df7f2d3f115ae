use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::codec::{decode_frame, FrameConfig, RawFrame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `AsyncRead` stream.
///
/// Owns the connection's accumulation buffer: partial reads are kept until a
/// whole frame has arrived, so callers always get complete frames and bytes
/// beyond the current frame stay buffered for the next call.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    config: FrameConfig,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: R, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when the stream ends between
    /// frames and `Err(FrameError::IncompleteFrame)` when it ends inside one.
    ///
    /// Cancel-safe: bytes only enter the buffer once a read has completed, so
    /// dropping this future inside `select!` loses nothing.
    pub async fn read_frame(&mut self) -> Result<RawFrame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_frame_size)? {
                trace!(id = frame.id, size = frame.payload.len(), "frame decoded");
                return Ok(frame);
            }

            self.buf.reserve(READ_CHUNK_SIZE);
            let read = self.inner.read_buf(&mut self.buf).await?;

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(FrameError::IncompleteFrame {
                    buffered: self.buf.len(),
                });
            }
        }
    }

    /// Bytes received but not yet forming a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
