/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] polynet_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] polynet_frame::FrameError),

    /// Message registry error.
    #[error("registry error: {0}")]
    Registry(#[from] polynet_registry::RegistryError),

    /// The peer configuration is unusable.
    #[error("invalid peer config: {0}")]
    InvalidConfig(String),

    /// The connection has already closed.
    #[error("connection closed")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, PeerError>;
