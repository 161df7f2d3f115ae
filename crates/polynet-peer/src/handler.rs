use std::fmt;
use std::future::Future;
use std::net::SocketAddr;

use bytes::BytesMut;
use polynet_registry::{Message, MessageRegistry, RegistryError};

/// Locally assigned connection identifier.
///
/// The listener hands them out sequentially from 1; a client session always
/// uses 0 for its single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    pub const CLIENT: Self = Self(0);
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the connection loop should do after a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Continue,
    /// Flush any responses already written, then close.
    Close,
}

/// Why a connection ended. Reported once to
/// [`MessageHandler::on_connection_closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the stream between frames.
    PeerClosed,
    /// A liveness challenge went unanswered.
    LivenessTimeout,
    /// The handler returned [`Disposition::Close`].
    HandlerRequested,
    /// Local shutdown: listener stopped or session closed.
    Shutdown,
    /// The peer broke framing or sent an undecodable message.
    Protocol(String),
    /// Reading from or writing to the stream failed.
    Transport(String),
}

impl CloseReason {
    /// Whether the close was expected rather than a failure.
    pub fn is_graceful(&self) -> bool {
        matches!(
            self,
            Self::PeerClosed | Self::HandlerRequested | Self::Shutdown
        )
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed"),
            Self::LivenessTimeout => f.write_str("liveness timeout"),
            Self::HandlerRequested => f.write_str("closed by handler"),
            Self::Shutdown => f.write_str("shutdown"),
            Self::Protocol(detail) => write!(f, "protocol error: {detail}"),
            Self::Transport(detail) => write!(f, "transport error: {detail}"),
        }
    }
}

/// Responses written while handling one inbound message.
///
/// Frames land in the connection's outbound buffer and go out right after
/// the handler returns.
pub struct ResponseBuffer<'a> {
    registry: &'a MessageRegistry,
    buf: &'a mut BytesMut,
    frames: usize,
}

impl<'a> ResponseBuffer<'a> {
    pub fn new(registry: &'a MessageRegistry, buf: &'a mut BytesMut) -> Self {
        Self {
            registry,
            buf,
            frames: 0,
        }
    }

    /// Frame `message` for sending.
    pub fn push(&mut self, message: &dyn Message) -> Result<(), RegistryError> {
        self.registry.write_frame(message, self.buf)?;
        self.frames += 1;
        Ok(())
    }

    /// Frames pushed so far.
    pub fn len(&self) -> usize {
        self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }
}

/// Application callbacks driven by every connection loop.
///
/// One handler instance is shared by all connections of a listener, so
/// per-connection state lives behind the [`ConnectionId`].
pub trait MessageHandler: Send + Sync + 'static {
    /// A connection is about to start reading.
    fn on_connection_opened(
        &self,
        id: ConnectionId,
        peer: SocketAddr,
    ) -> impl Future<Output = ()> + Send {
        let _ = (id, peer);
        async {}
    }

    /// One decoded, non-liveness message.
    fn on_message(
        &self,
        id: ConnectionId,
        message: Box<dyn Message>,
        responses: &mut ResponseBuffer<'_>,
    ) -> impl Future<Output = Disposition> + Send;

    /// Called exactly once per connection, after it stopped.
    fn on_connection_closed(
        &self,
        id: ConnectionId,
        reason: &CloseReason,
    ) -> impl Future<Output = ()> + Send;
}
