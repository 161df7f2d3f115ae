use std::collections::BTreeMap;

use super::protocol::{Lobby, PlayerData};

/// Result of removing a player from a lobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyChange {
    /// The lobby still has players.
    Updated(Lobby),
    /// The last player left and the lobby is gone.
    Deleted(u32),
}

/// Why a player could not join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRefusal {
    UnknownLobby,
    Full,
    AlreadyJoined,
}

/// Open lobbies, keyed by id. Ids are handed out sequentially from 1.
#[derive(Debug)]
pub struct LobbyManager {
    lobbies: BTreeMap<u32, Lobby>,
    next_id: u32,
}

impl Default for LobbyManager {
    fn default() -> Self {
        Self {
            lobbies: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl LobbyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty lobby and return a snapshot of it.
    pub fn create(&mut self, max_players: u32) -> Lobby {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);

        let lobby = Lobby {
            id,
            max_players,
            players: Vec::new(),
        };
        self.lobbies.insert(id, lobby.clone());
        lobby
    }

    pub fn get(&self, id: u32) -> Option<&Lobby> {
        self.lobbies.get(&id)
    }

    /// Snapshot of every lobby, ordered by id.
    pub fn list(&self) -> Vec<Lobby> {
        self.lobbies.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lobbies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lobbies.is_empty()
    }

    /// Seat `name` in lobby `id`, returning the updated lobby.
    pub fn add_player(&mut self, id: u32, name: &str) -> Result<Lobby, JoinRefusal> {
        let lobby = self.lobbies.get_mut(&id).ok_or(JoinRefusal::UnknownLobby)?;
        if lobby.has_player(name) {
            return Err(JoinRefusal::AlreadyJoined);
        }
        if lobby.is_full() {
            return Err(JoinRefusal::Full);
        }
        lobby.players.push(PlayerData {
            name: name.to_string(),
        });
        Ok(lobby.clone())
    }

    /// Take `name` out of lobby `id`. Empty lobbies are deleted.
    ///
    /// Returns `None` if the lobby does not exist or the player was not in it.
    pub fn remove_player(&mut self, id: u32, name: &str) -> Option<LobbyChange> {
        let lobby = self.lobbies.get_mut(&id)?;
        let before = lobby.players.len();
        lobby.players.retain(|player| player.name != name);
        if lobby.players.len() == before {
            return None;
        }

        if lobby.players.is_empty() {
            self.lobbies.remove(&id);
            Some(LobbyChange::Deleted(id))
        } else {
            Some(LobbyChange::Updated(lobby.clone()))
        }
    }

    /// Take `name` out of every lobby it sits in.
    pub fn remove_player_everywhere(&mut self, name: &str) -> Vec<LobbyChange> {
        let seated: Vec<u32> = self
            .lobbies
            .values()
            .filter(|lobby| lobby.has_player(name))
            .map(|lobby| lobby.id)
            .collect();

        seated
            .into_iter()
            .filter_map(|id| self.remove_player(id, name))
            .collect()
    }
}
