use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use polynet_peer::{
    CloseReason, ConnectionId, Disposition, MessageHandler, OutboundTable, PeerConfig,
    PeerListener, ResponseBuffer,
};
use polynet_registry::{AsAny, Message, RegistryError};
use tracing::{debug, error, info, warn};

use super::manager::{LobbyChange, LobbyManager};
use super::protocol::{
    registry, CreateLobby, CreateLobbyResponse, GetLobbies, GetLobbiesResponse, Handshake,
    HandshakeResponse, Lobby, LobbyConnect, LobbyConnectResponse, LobbyDeleted, LobbyDisconnect,
    LobbyDisconnectResponse, LobbyUpdate, RegisterUser, RegisterUserResponse, PROTOCOL_VERSION,
};

/// Port the lobby server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 6969;

#[derive(Default)]
struct State {
    lobbies: LobbyManager,
    handshaken: HashSet<ConnectionId>,
    names: HashMap<ConnectionId, String>,
}

impl State {
    fn registered(&self) -> Vec<ConnectionId> {
        self.names.keys().copied().collect()
    }
}

/// Server side of the lobby protocol.
///
/// Lobby changes are pushed to every connection that has registered a name.
pub struct LobbyServer {
    outbound: Arc<OutboundTable>,
    state: Mutex<State>,
}

impl LobbyServer {
    /// A server that pushes lobby changes through `outbound`.
    ///
    /// The listener running this handler must use the same table, see
    /// [`PeerListener::with_outbound`].
    pub fn new(outbound: Arc<OutboundTable>) -> Self {
        Self {
            outbound,
            state: Mutex::new(State::default()),
        }
    }

    /// Bind a listener wired to a fresh lobby server.
    pub async fn bind(
        addr: SocketAddr,
        config: PeerConfig,
    ) -> polynet_peer::Result<PeerListener<LobbyServer>> {
        let outbound = Arc::new(OutboundTable::new());
        let server = Arc::new(Self::new(Arc::clone(&outbound)));
        let listener = PeerListener::bind(addr, Arc::new(registry()?), server, config).await?;
        Ok(listener.with_outbound(outbound))
    }

    /// Snapshot of the open lobbies.
    pub fn lobbies(&self) -> Vec<Lobby> {
        self.state.lock().lobbies.list()
    }

    /// Name registered by connection `id`, if any.
    pub fn player_name(&self, id: ConnectionId) -> Option<String> {
        self.state.lock().names.get(&id).cloned()
    }

    fn push_change(&self, state: &State, change: LobbyChange) {
        let targets = state.registered();
        let reached = match change {
            LobbyChange::Updated(lobby) => self.outbound.send_to_many(targets, LobbyUpdate { lobby }),
            LobbyChange::Deleted(id) => self.outbound.send_to_many(targets, LobbyDeleted { id }),
        };
        debug!(reached, "pushed lobby change");
    }

    fn handle(
        &self,
        id: ConnectionId,
        message: &dyn Message,
        responses: &mut ResponseBuffer<'_>,
    ) -> Result<Disposition, RegistryError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(handshake) = message.downcast_ref::<Handshake>() {
            let ok = handshake.version == PROTOCOL_VERSION;
            responses.push(&HandshakeResponse { ok })?;
            if !ok {
                warn!(conn = %id, version = %handshake.version, "protocol version mismatch");
                return Ok(Disposition::Close);
            }
            state.handshaken.insert(id);
            return Ok(Disposition::Continue);
        }

        if !state.handshaken.contains(&id) {
            debug!(conn = %id, message = message.type_name(), "dropping message before handshake");
            return Ok(Disposition::Continue);
        }

        if let Some(register) = message.downcast_ref::<RegisterUser>() {
            let ok = !register.name.is_empty();
            if ok {
                self.register(state, id, &register.name);
            }
            responses.push(&RegisterUserResponse { ok })?;
        } else if message.is::<GetLobbies>() {
            responses.push(&GetLobbiesResponse {
                lobbies: state.lobbies.list(),
            })?;
        } else if let Some(create) = message.downcast_ref::<CreateLobby>() {
            if create.max_players == 0 {
                responses.push(&CreateLobbyResponse { ok: false, id: 0 })?;
            } else {
                let lobby = state.lobbies.create(create.max_players);
                info!(conn = %id, lobby = lobby.id, max_players = lobby.max_players, "lobby created");
                let lobby_id = lobby.id;
                self.push_change(state, LobbyChange::Updated(lobby));
                responses.push(&CreateLobbyResponse {
                    ok: true,
                    id: lobby_id,
                })?;
            }
        } else if let Some(join) = message.downcast_ref::<LobbyConnect>() {
            let joined = match state.names.get(&id) {
                Some(name) => state.lobbies.add_player(join.id, name).map_err(|refusal| {
                    debug!(conn = %id, lobby = join.id, ?refusal, "join refused");
                }),
                None => {
                    debug!(conn = %id, lobby = join.id, "join before registering");
                    Err(())
                }
            };
            let ok = joined.is_ok();
            if let Ok(lobby) = joined {
                self.push_change(state, LobbyChange::Updated(lobby));
            }
            responses.push(&LobbyConnectResponse { ok })?;
        } else if let Some(leave) = message.downcast_ref::<LobbyDisconnect>() {
            let change = state
                .names
                .get(&id)
                .and_then(|name| state.lobbies.remove_player(leave.id, name));
            let ok = change.is_some();
            if let Some(change) = change {
                self.push_change(state, change);
            }
            responses.push(&LobbyDisconnectResponse { ok })?;
        } else {
            debug!(conn = %id, message = message.type_name(), "ignoring message");
        }

        Ok(Disposition::Continue)
    }

    /// Give `name` to `id`, taking it from whoever held it before.
    fn register(&self, state: &mut State, id: ConnectionId, name: &str) {
        state.names.retain(|holder, held| {
            let stolen = *holder != id && held.as_str() == name;
            if stolen {
                info!(conn = %holder, name, "name taken over by another connection");
            }
            !stolen
        });

        if let Some(previous) = state.names.insert(id, name.to_string()) {
            if previous != name {
                for change in state.lobbies.remove_player_everywhere(&previous) {
                    self.push_change(state, change);
                }
            }
        }
        info!(conn = %id, name, "player registered");
    }
}

impl MessageHandler for LobbyServer {
    async fn on_message(
        &self,
        id: ConnectionId,
        message: Box<dyn Message>,
        responses: &mut ResponseBuffer<'_>,
    ) -> Disposition {
        match self.handle(id, &*message, responses) {
            Ok(disposition) => disposition,
            Err(err) => {
                error!(conn = %id, error = %err, "failed to frame response");
                Disposition::Close
            }
        }
    }

    async fn on_connection_closed(&self, id: ConnectionId, reason: &CloseReason) {
        let mut state = self.state.lock();
        state.handshaken.remove(&id);
        let Some(name) = state.names.remove(&id) else {
            return;
        };
        debug!(conn = %id, name = %name, %reason, "releasing player");
        for change in state.lobbies.remove_player_everywhere(&name) {
            self.push_change(&state, change);
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;
    use polynet_frame::{decode_frame, DEFAULT_MAX_FRAME_SIZE};
    use polynet_registry::MessageRegistry;

    use super::*;
    use crate::lobby::protocol::PlayerData;

    struct Harness {
        server: LobbyServer,
        registry: MessageRegistry,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                server: LobbyServer::new(Arc::new(OutboundTable::new())),
                registry: registry().unwrap(),
            }
        }

        async fn send<M: Message>(
            &self,
            id: u32,
            message: M,
        ) -> (Disposition, Vec<Box<dyn Message>>) {
            let mut out = BytesMut::new();
            let mut responses = ResponseBuffer::new(&self.registry, &mut out);
            let disposition = self
                .server
                .on_message(ConnectionId(id), Box::new(message), &mut responses)
                .await;

            let mut replies = Vec::new();
            while let Some(frame) = decode_frame(&mut out, DEFAULT_MAX_FRAME_SIZE).unwrap() {
                replies.push(self.registry.decode(frame.id, &frame.payload).unwrap());
            }
            (disposition, replies)
        }

        async fn reply<M: Message, R: Message + Clone>(&self, id: u32, message: M) -> R {
            let (disposition, replies) = self.send(id, message).await;
            assert_eq!(disposition, Disposition::Continue);
            assert_eq!(replies.len(), 1, "{replies:?}");
            replies[0].downcast_ref::<R>().cloned().unwrap()
        }

        async fn login(&self, id: u32, name: &str) {
            let hello: HandshakeResponse = self
                .reply(
                    id,
                    Handshake {
                        version: PROTOCOL_VERSION.to_string(),
                    },
                )
                .await;
            assert!(hello.ok);
            let registered: RegisterUserResponse = self
                .reply(
                    id,
                    RegisterUser {
                        name: name.to_string(),
                    },
                )
                .await;
            assert!(registered.ok);
        }
    }

    #[tokio::test]
    async fn version_mismatch_rejects_and_closes() {
        let harness = Harness::new();
        let (disposition, replies) = harness
            .send(
                1,
                Handshake {
                    version: "9.9.9".to_string(),
                },
            )
            .await;

        assert_eq!(disposition, Disposition::Close);
        assert_eq!(
            replies[0].downcast_ref::<HandshakeResponse>(),
            Some(&HandshakeResponse { ok: false })
        );
    }

    #[tokio::test]
    async fn messages_before_handshake_are_dropped() {
        let harness = Harness::new();
        let (disposition, replies) = harness.send(1, GetLobbies {}).await;
        assert_eq!(disposition, Disposition::Continue);
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn create_join_and_list() {
        let harness = Harness::new();
        harness.login(1, "ada").await;

        let created: CreateLobbyResponse = harness.reply(1, CreateLobby { max_players: 2 }).await;
        assert_eq!(created, CreateLobbyResponse { ok: true, id: 1 });

        let joined: LobbyConnectResponse = harness.reply(1, LobbyConnect { id: 1 }).await;
        assert!(joined.ok);

        let listed: GetLobbiesResponse = harness.reply(1, GetLobbies {}).await;
        assert_eq!(
            listed.lobbies,
            vec![Lobby {
                id: 1,
                max_players: 2,
                players: vec![PlayerData {
                    name: "ada".to_string()
                }],
            }]
        );
    }

    #[tokio::test]
    async fn join_refusals() {
        let harness = Harness::new();
        harness.login(1, "ada").await;
        let _: HandshakeResponse = harness
            .reply(
                2,
                Handshake {
                    version: PROTOCOL_VERSION.to_string(),
                },
            )
            .await;

        let zero: CreateLobbyResponse = harness.reply(1, CreateLobby { max_players: 0 }).await;
        assert!(!zero.ok);
        let _: CreateLobbyResponse = harness.reply(1, CreateLobby { max_players: 1 }).await;

        let unregistered: LobbyConnectResponse = harness.reply(2, LobbyConnect { id: 1 }).await;
        assert!(!unregistered.ok);
        let unknown: LobbyConnectResponse = harness.reply(1, LobbyConnect { id: 7 }).await;
        assert!(!unknown.ok);

        let _: LobbyConnectResponse = harness.reply(1, LobbyConnect { id: 1 }).await;
        harness.login(3, "bob").await;
        let full: LobbyConnectResponse = harness.reply(3, LobbyConnect { id: 1 }).await;
        assert!(!full.ok);
    }

    #[tokio::test]
    async fn leaving_last_seat_deletes_lobby() {
        let harness = Harness::new();
        harness.login(1, "ada").await;
        let _: CreateLobbyResponse = harness.reply(1, CreateLobby { max_players: 4 }).await;
        let _: LobbyConnectResponse = harness.reply(1, LobbyConnect { id: 1 }).await;

        let left: LobbyDisconnectResponse = harness.reply(1, LobbyDisconnect { id: 1 }).await;
        assert!(left.ok);
        assert!(harness.server.lobbies().is_empty());

        let again: LobbyDisconnectResponse = harness.reply(1, LobbyDisconnect { id: 1 }).await;
        assert!(!again.ok);
    }

    #[tokio::test]
    async fn registering_takes_over_a_name() {
        let harness = Harness::new();
        harness.login(1, "ada").await;
        harness.login(2, "ada").await;

        assert_eq!(harness.server.player_name(ConnectionId(1)), None);
        assert_eq!(
            harness.server.player_name(ConnectionId(2)).as_deref(),
            Some("ada")
        );
    }

    #[tokio::test]
    async fn closed_connection_gives_up_its_seats() {
        let harness = Harness::new();
        harness.login(1, "ada").await;
        harness.login(2, "bob").await;
        let _: CreateLobbyResponse = harness.reply(1, CreateLobby { max_players: 4 }).await;
        let _: LobbyConnectResponse = harness.reply(1, LobbyConnect { id: 1 }).await;
        let _: LobbyConnectResponse = harness.reply(2, LobbyConnect { id: 1 }).await;

        harness
            .server
            .on_connection_closed(ConnectionId(1), &CloseReason::PeerClosed)
            .await;

        let lobbies = harness.server.lobbies();
        assert_eq!(lobbies.len(), 1);
        assert!(!lobbies[0].has_player("ada"));
        assert!(lobbies[0].has_player("bob"));
        assert_eq!(harness.server.player_name(ConnectionId(1)), None);
    }
}
