use std::time::Duration;

use polynet_peer::{CloseReason, PeerError};
use polynet_registry::RegistryError;

/// Errors from the lobby client.
#[derive(Debug, thiserror::Error)]
pub enum LobbyError {
    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("no {expected} within {timeout:?}")]
    Timeout {
        expected: &'static str,
        timeout: Duration,
    },

    #[error("connection closed: {0}")]
    Closed(CloseReason),

    #[error("server refused {0}")]
    Rejected(&'static str),
}

pub type Result<T> = std::result::Result<T, LobbyError>;
