use std::io::IsTerminal;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use polynet::lobby::{Lobby, LobbyChange, PROTOCOL_VERSION};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct LobbyOutput<'a> {
    id: u32,
    max_players: u32,
    players: Vec<&'a str>,
}

impl<'a> From<&'a Lobby> for LobbyOutput<'a> {
    fn from(lobby: &'a Lobby) -> Self {
        Self {
            id: lobby.id,
            max_players: lobby.max_players,
            players: lobby.players.iter().map(|p| p.name.as_str()).collect(),
        }
    }
}

#[derive(Serialize)]
struct LobbyListOutput<'a> {
    lobbies: Vec<LobbyOutput<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ChangeOutput<'a> {
    Updated {
        lobby: LobbyOutput<'a>,
        timestamp: String,
    },
    Deleted {
        id: u32,
        timestamp: String,
    },
}

#[derive(Serialize)]
struct ListeningOutput {
    addr: String,
    protocol_version: &'static str,
}

pub fn print_listening(addr: SocketAddr, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ListeningOutput {
                addr: addr.to_string(),
                protocol_version: PROTOCOL_VERSION,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("listening on {addr} (protocol {PROTOCOL_VERSION})");
        }
    }
}

pub fn print_lobbies(lobbies: &[Lobby], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = LobbyListOutput {
                lobbies: lobbies.iter().map(LobbyOutput::from).collect(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = lobby_table();
            for lobby in lobbies {
                table.add_row(lobby_row(lobby));
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if lobbies.is_empty() {
                println!("no lobbies");
            }
            for lobby in lobbies {
                println!("{}", pretty_lobby(lobby));
            }
        }
    }
}

pub fn print_change(change: &LobbyChange, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let timestamp = now_unix_seconds();
            let out = match change {
                LobbyChange::Updated(lobby) => ChangeOutput::Updated {
                    lobby: LobbyOutput::from(lobby),
                    timestamp,
                },
                LobbyChange::Deleted(id) => ChangeOutput::Deleted { id: *id, timestamp },
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => match change {
            LobbyChange::Updated(lobby) => {
                let mut table = lobby_table();
                table.add_row(lobby_row(lobby));
                println!("{table}");
            }
            LobbyChange::Deleted(id) => println!("lobby {id} deleted"),
        },
        OutputFormat::Pretty => match change {
            LobbyChange::Updated(lobby) => println!("updated {}", pretty_lobby(lobby)),
            LobbyChange::Deleted(id) => println!("deleted lobby {id}"),
        },
    }
}

fn lobby_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "SEATS", "PLAYERS"]);
    table
}

fn lobby_row(lobby: &Lobby) -> Vec<String> {
    vec![
        lobby.id.to_string(),
        format!("{}/{}", lobby.players.len(), lobby.max_players),
        player_names(lobby),
    ]
}

fn pretty_lobby(lobby: &Lobby) -> String {
    format!(
        "lobby {} seats={}/{} players=[{}]",
        lobby.id,
        lobby.players.len(),
        lobby.max_players,
        player_names(lobby)
    )
}

fn player_names(lobby: &Lobby) -> String {
    lobby
        .players
        .iter()
        .map(|p| p.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
