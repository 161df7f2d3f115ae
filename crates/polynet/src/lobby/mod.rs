//! Reference lobby protocol: a server that tracks named players and their
//! lobbies, and a client that talks to it.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use polynet::lobby::{LobbyConnection, LobbyServer};
//! use polynet::peer::PeerConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let listener = LobbyServer::bind("127.0.0.1:0".parse()?, PeerConfig::server()).await?;
//! let addr = listener.local_addr();
//! let shutdown = CancellationToken::new();
//! tokio::spawn(listener.serve(shutdown.clone()));
//!
//! let mut conn = LobbyConnection::connect(addr, Duration::from_secs(5)).await?;
//! conn.register("ada").await?;
//! let id = conn.create_lobby(4).await?;
//! conn.join(id).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod server;

pub use client::{LobbyClient, LobbyConnection, DEFAULT_REQUEST_TIMEOUT, MAX_PENDING_CHANGES};
pub use error::{LobbyError, Result};
pub use manager::{JoinRefusal, LobbyChange, LobbyManager};
pub use protocol::{registry, Lobby, PlayerData, PROTOCOL_VERSION};
pub use server::{LobbyServer, DEFAULT_PORT};
