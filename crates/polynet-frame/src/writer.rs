use bytes::BytesMut;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig, RawFrame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `AsyncWrite` stream.
///
/// Frames are staged in an outbound buffer and flushed together by
/// [`send_and_clear`](Self::send_and_clear), so several responses produced for
/// one inbound message leave in a single write.
pub struct FrameWriter<W> {
    inner: W,
    buf: BytesMut,
    config: FrameConfig,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// The staging buffer. Anything appended here goes out on the next
    /// [`send_and_clear`](Self::send_and_clear).
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Stage one frame.
    pub fn stage(&mut self, id: u32, payload: &[u8]) -> Result<()> {
        encode_frame(id, payload, &mut self.buf)
    }

    /// Write every staged byte, flush, and empty the buffer.
    ///
    /// Bounded by `write_timeout` when one is configured. On error the
    /// buffer state is unspecified and the stream should be dropped.
    pub async fn send_and_clear(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }

        let staged = self.buf.len();
        match self.config.write_timeout {
            Some(limit) => tokio::time::timeout(limit, write_out(&mut self.inner, &self.buf))
                .await
                .map_err(|_| FrameError::WriteTimeout(limit))??,
            None => write_out(&mut self.inner, &self.buf).await?,
        }
        self.buf.clear();

        trace!(bytes = staged, "outbound buffer flushed");
        Ok(())
    }

    /// Stage a frame and send it immediately.
    pub async fn write_frame(&mut self, frame: &RawFrame) -> Result<()> {
        self.stage(frame.id, frame.payload.as_ref())?;
        self.send_and_clear().await
    }

    /// Shut down the write half of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

async fn write_out<W: AsyncWrite + Unpin>(inner: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    inner.write_all(bytes).await?;
    inner.flush().await
}
