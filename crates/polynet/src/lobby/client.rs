use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use polynet_peer::{
    connect, ClientSession, CloseReason, ConnectionId, Disposition, MessageHandler, PeerConfig,
    ResponseBuffer,
};
use polynet_registry::{AsAny, Message};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::{LobbyError, Result};
use super::manager::LobbyChange;
use super::protocol::{
    registry, CreateLobby, CreateLobbyResponse, GetLobbies, GetLobbiesResponse, Handshake,
    HandshakeResponse, Lobby, LobbyConnect, LobbyConnectResponse, LobbyDeleted, LobbyDisconnect,
    LobbyDisconnectResponse, LobbyUpdate, RegisterUser, RegisterUserResponse, PROTOCOL_VERSION,
};

/// Default wait for a reply to a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Lobby changes kept for [`LobbyConnection::next_push`] before the oldest
/// are dropped.
pub const MAX_PENDING_CHANGES: usize = 256;

/// Client-side handler that forwards every message to a channel.
pub struct LobbyClient {
    inbound: mpsc::UnboundedSender<Box<dyn Message>>,
}

impl LobbyClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Box<dyn Message>>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        (Self { inbound }, rx)
    }
}

impl MessageHandler for LobbyClient {
    async fn on_message(
        &self,
        _id: ConnectionId,
        message: Box<dyn Message>,
        _responses: &mut ResponseBuffer<'_>,
    ) -> Disposition {
        if self.inbound.send(message).is_err() {
            return Disposition::Close;
        }
        Disposition::Continue
    }

    async fn on_connection_closed(&self, _id: ConnectionId, reason: &CloseReason) {
        debug!(%reason, "lobby connection closed");
    }
}

/// A handshaken connection to a lobby server with request/response helpers.
///
/// Lobby changes that arrive while a request is outstanding are kept, up to
/// [`MAX_PENDING_CHANGES`], and handed out by [`next_push`](Self::next_push).
pub struct LobbyConnection {
    session: ClientSession,
    inbound: mpsc::UnboundedReceiver<Box<dyn Message>>,
    pending: VecDeque<LobbyChange>,
    max_pending: usize,
    timeout: Duration,
}

impl LobbyConnection {
    /// Connect and perform the handshake.
    pub async fn connect(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        Self::connect_with(addr, PeerConfig::client(), timeout).await
    }

    pub async fn connect_with(addr: SocketAddr, config: PeerConfig, timeout: Duration) -> Result<Self> {
        let (handler, inbound) = LobbyClient::new();
        let session = connect(addr, Arc::new(registry()?), Arc::new(handler), config).await?;

        let mut conn = Self {
            session,
            inbound,
            pending: VecDeque::new(),
            max_pending: MAX_PENDING_CHANGES,
            timeout,
        };
        let response: HandshakeResponse = conn
            .request(
                Handshake {
                    version: PROTOCOL_VERSION.to_string(),
                },
                "handshake response",
            )
            .await?;
        if !response.ok {
            return Err(LobbyError::Rejected("handshake"));
        }
        Ok(conn)
    }

    pub async fn register(&mut self, name: &str) -> Result<()> {
        let response: RegisterUserResponse = self
            .request(
                RegisterUser {
                    name: name.to_string(),
                },
                "register response",
            )
            .await?;
        if !response.ok {
            return Err(LobbyError::Rejected("registration"));
        }
        Ok(())
    }

    pub async fn list_lobbies(&mut self) -> Result<Vec<Lobby>> {
        let response: GetLobbiesResponse = self.request(GetLobbies {}, "lobby list").await?;
        Ok(response.lobbies)
    }

    /// Open a lobby and return its id.
    pub async fn create_lobby(&mut self, max_players: u32) -> Result<u32> {
        let response: CreateLobbyResponse = self
            .request(CreateLobby { max_players }, "create response")
            .await?;
        if !response.ok {
            return Err(LobbyError::Rejected("lobby creation"));
        }
        Ok(response.id)
    }

    pub async fn join(&mut self, id: u32) -> Result<()> {
        let response: LobbyConnectResponse =
            self.request(LobbyConnect { id }, "join response").await?;
        if !response.ok {
            return Err(LobbyError::Rejected("join"));
        }
        Ok(())
    }

    pub async fn leave(&mut self, id: u32) -> Result<()> {
        let response: LobbyDisconnectResponse =
            self.request(LobbyDisconnect { id }, "leave response").await?;
        if !response.ok {
            return Err(LobbyError::Rejected("leave"));
        }
        Ok(())
    }

    /// Wait for the next lobby change pushed by the server.
    pub async fn next_push(&mut self) -> Result<LobbyChange> {
        if let Some(change) = self.pending.pop_front() {
            return Ok(change);
        }
        loop {
            let Some(message) = self.inbound.recv().await else {
                return Err(LobbyError::Closed(self.session.closed().await));
            };
            if let Some(change) = into_change(message) {
                return Ok(change);
            }
        }
    }

    pub fn close(&self) {
        self.session.close();
    }

    pub async fn closed(&mut self) -> CloseReason {
        self.session.closed().await
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.session.peer_addr()
    }

    fn keep(&mut self, change: LobbyChange) {
        if self.pending.len() >= self.max_pending {
            self.pending.pop_front();
            warn!(limit = self.max_pending, "dropping oldest unread lobby change");
        }
        self.pending.push_back(change);
    }

    async fn request<Req: Message, Resp: Message>(
        &mut self,
        request: Req,
        expected: &'static str,
    ) -> Result<Resp> {
        self.session.send(request)?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let message = match tokio::time::timeout_at(deadline, self.inbound.recv()).await {
                Ok(Some(message)) => message,
                Ok(None) => return Err(LobbyError::Closed(self.session.closed().await)),
                Err(_) => {
                    return Err(LobbyError::Timeout {
                        expected,
                        timeout: self.timeout,
                    })
                }
            };
            match message.downcast::<Resp>() {
                Ok(response) => return Ok(*response),
                Err(other) => {
                    if let Some(change) = into_change(other) {
                        self.keep(change);
                    }
                }
            }
        }
    }
}

fn into_change(message: Box<dyn Message>) -> Option<LobbyChange> {
    let message = match message.downcast::<LobbyUpdate>() {
        Ok(update) => return Some(LobbyChange::Updated(update.lobby)),
        Err(message) => message,
    };
    if let Some(deleted) = message.downcast_ref::<LobbyDeleted>() {
        return Some(LobbyChange::Deleted(deleted.id));
    }
    let erased: &dyn Message = &*message;
    debug!(message = erased.type_name(), "skipping unsolicited message");
    None
}
