//! Message set spoken between the lobby server and game clients.
//!
//! Identifiers are fixed; both ends build the same table with [`registry`].

use bytes::BytesMut;
use polynet_frame::{WireCursor, WireDecode, WireEncode};
use polynet_peer::LivenessChallenge;
use polynet_registry::{Message, MessageRegistry};

/// Version a client must announce in its [`Handshake`].
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Wire identifiers of the lobby protocol.
pub mod ids {
    pub const LIVENESS_CHALLENGE: u32 = 0;
    pub const HANDSHAKE: u32 = 1;
    pub const HANDSHAKE_RESPONSE: u32 = 2;
    pub const REGISTER_USER: u32 = 3;
    pub const REGISTER_USER_RESPONSE: u32 = 4;
    pub const GET_LOBBIES: u32 = 5;
    pub const GET_LOBBIES_RESPONSE: u32 = 6;
    pub const CREATE_LOBBY: u32 = 7;
    pub const CREATE_LOBBY_RESPONSE: u32 = 8;
    pub const LOBBY_CONNECT: u32 = 9;
    pub const LOBBY_CONNECT_RESPONSE: u32 = 10;
    pub const LOBBY_DISCONNECT: u32 = 11;
    pub const LOBBY_DISCONNECT_RESPONSE: u32 = 12;
    pub const LOBBY_UPDATE: u32 = 13;
    pub const LOBBY_DELETED: u32 = 14;
}

/// Declares a struct whose fields go on the wire in declaration order.
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$field_meta:meta])* $field:ident: $ty:ty),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            $($(#[$field_meta])* pub $field: $ty,)*
        }

        impl WireEncode for $name {
            fn encode(&self, dst: &mut BytesMut) {
                let _ = &dst;
                $(self.$field.encode(dst);)*
            }
        }

        impl WireDecode for $name {
            const MIN_WIRE_SIZE: usize = 0 $(+ <$ty as WireDecode>::MIN_WIRE_SIZE)*;

            fn decode(src: &mut WireCursor<'_>) -> polynet_frame::Result<Self> {
                let _ = &src;
                Ok(Self {
                    $($field: src.read()?,)*
                })
            }
        }
    };
}

/// [`wire_record!`] plus the [`Message`] marker.
macro_rules! wire_message {
    ($(#[$meta:meta])* $name:ident $body:tt) => {
        wire_record!($(#[$meta])* $name $body);

        impl Message for $name {}
    };
}

wire_record!(
    /// One seat in a lobby.
    PlayerData { name: String }
);

wire_record!(
    /// A lobby as clients see it.
    Lobby {
        id: u32,
        max_players: u32,
        players: Vec<PlayerData>,
    }
);

impl Lobby {
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn has_player(&self, name: &str) -> bool {
        self.players.iter().any(|player| player.name == name)
    }
}

wire_message!(
    /// First message of every client; answered with [`HandshakeResponse`].
    Handshake { version: String }
);

wire_message!(HandshakeResponse { ok: bool });

wire_message!(
    /// Claim a player name for this connection.
    RegisterUser { name: String }
);

wire_message!(RegisterUserResponse { ok: bool });

wire_message!(GetLobbies {});

wire_message!(GetLobbiesResponse { lobbies: Vec<Lobby> });

wire_message!(CreateLobby { max_players: u32 });

wire_message!(CreateLobbyResponse { ok: bool, id: u32 });

wire_message!(
    /// Join the lobby `id` under the registered name.
    LobbyConnect { id: u32 }
);

wire_message!(LobbyConnectResponse { ok: bool });

wire_message!(LobbyDisconnect { id: u32 });

wire_message!(LobbyDisconnectResponse { ok: bool });

wire_message!(
    /// Pushed to every registered client when a lobby changes.
    LobbyUpdate { lobby: Lobby }
);

wire_message!(
    /// Pushed to every registered client when a lobby empties out.
    LobbyDeleted { id: u32 }
);

/// The shared lobby protocol table.
pub fn registry() -> polynet_registry::Result<MessageRegistry> {
    let mut builder = MessageRegistry::builder();
    builder
        .register::<LivenessChallenge>(ids::LIVENESS_CHALLENGE)?
        .register::<Handshake>(ids::HANDSHAKE)?
        .register::<HandshakeResponse>(ids::HANDSHAKE_RESPONSE)?
        .register::<RegisterUser>(ids::REGISTER_USER)?
        .register::<RegisterUserResponse>(ids::REGISTER_USER_RESPONSE)?
        .register::<GetLobbies>(ids::GET_LOBBIES)?
        .register::<GetLobbiesResponse>(ids::GET_LOBBIES_RESPONSE)?
        .register::<CreateLobby>(ids::CREATE_LOBBY)?
        .register::<CreateLobbyResponse>(ids::CREATE_LOBBY_RESPONSE)?
        .register::<LobbyConnect>(ids::LOBBY_CONNECT)?
        .register::<LobbyConnectResponse>(ids::LOBBY_CONNECT_RESPONSE)?
        .register::<LobbyDisconnect>(ids::LOBBY_DISCONNECT)?
        .register::<LobbyDisconnectResponse>(ids::LOBBY_DISCONNECT_RESPONSE)?
        .register::<LobbyUpdate>(ids::LOBBY_UPDATE)?
        .register::<LobbyDeleted>(ids::LOBBY_DELETED)?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use polynet_frame::{decode_frame, DEFAULT_MAX_FRAME_SIZE};

    use super::*;

    fn sample_lobby() -> Lobby {
        Lobby {
            id: 3,
            max_players: 4,
            players: vec![
                PlayerData {
                    name: "ada".to_string(),
                },
                PlayerData {
                    name: "bob".to_string(),
                },
            ],
        }
    }

    #[test]
    fn registry_covers_every_id() {
        let registry = registry().unwrap();
        assert_eq!(registry.len(), 15);
        for id in 0..15 {
            assert!(registry.contains_id(id), "id {id}");
        }
        assert_eq!(registry.id_for::<LobbyDeleted>().unwrap(), ids::LOBBY_DELETED);
    }

    #[test]
    fn lobby_update_layout() {
        let registry = registry().unwrap();
        let mut buf = BytesMut::new();
        registry
            .write_frame(&LobbyUpdate { lobby: sample_lobby() }, &mut buf)
            .unwrap();

        #[rustfmt::skip]
        let expected: &[u8] = &[
            0, 0, 0, 30,            // length
            0, 0, 0, 13,            // LobbyUpdate
            0, 0, 0, 3,             // id
            0, 0, 0, 4,             // max players
            0, 0, 0, 2,             // player count
            0, 0, 0, 3, b'a', b'd', b'a',
            0, 0, 0, 3, b'b', b'o', b'b',
        ];
        assert_eq!(buf.as_ref(), expected);
    }

    #[test]
    fn nested_lobbies_decode_back() {
        let registry = registry().unwrap();
        let response = GetLobbiesResponse {
            lobbies: vec![
                sample_lobby(),
                Lobby {
                    id: 9,
                    max_players: 2,
                    players: Vec::new(),
                },
            ],
        };
        let mut buf = BytesMut::new();
        registry.write_frame(&response, &mut buf).unwrap();

        let frame = decode_frame(&mut buf, DEFAULT_MAX_FRAME_SIZE).unwrap().unwrap();
        let decoded = registry.decode(frame.id, &frame.payload).unwrap();
        assert_eq!(decoded.downcast_ref::<GetLobbiesResponse>(), Some(&response));
    }

    #[test]
    fn empty_message_has_empty_payload() {
        let registry = registry().unwrap();
        let mut buf = BytesMut::new();
        registry.write_frame(&GetLobbies {}, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0, 0, 0, 4, 0, 0, 0, 5]);
    }

    #[test]
    fn create_response_field_order() {
        let mut buf = BytesMut::new();
        CreateLobbyResponse { ok: true, id: 258 }.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[1, 0, 0, 1, 2]);
    }

    #[test]
    fn lobby_fullness() {
        let mut lobby = sample_lobby();
        assert!(!lobby.is_full());
        assert!(lobby.has_player("bob"));
        lobby.max_players = 2;
        assert!(lobby.is_full());
    }
}
