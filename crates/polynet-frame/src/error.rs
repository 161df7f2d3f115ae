/// Errors that can occur during field or frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The declared frame length cannot hold a message identifier.
    #[error("malformed frame: declared length {0} is shorter than the message id")]
    MalformedFrame(u32),

    /// The declared frame length exceeds the configured maximum.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// A field read ran past the end of the frame payload.
    #[error("truncated payload: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// A text or sequence length field claims more bytes than the frame holds.
    #[error("length field {declared} exceeds the {remaining} bytes left in the frame")]
    LengthOverflow { declared: u32, remaining: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a frame did not finish within the configured timeout.
    #[error("frame write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    /// The stream ended in the middle of a frame.
    #[error("connection closed (incomplete frame, {buffered} bytes buffered)")]
    IncompleteFrame { buffered: usize },

    /// The stream ended cleanly between frames.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
