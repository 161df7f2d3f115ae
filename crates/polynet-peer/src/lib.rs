//! Connection management for polynet.
//!
//! This is the layer collaborators talk to. A [`PeerListener`] accepts
//! connections and runs one connection loop per peer; [`connect`] dials a
//! server and runs a single loop for it. Each loop:
//!
//! - reads frames, decodes them through the shared [`MessageRegistry`] and
//!   hands them to a [`MessageHandler`]
//! - flushes handler responses and queued pushes from the [`OutboundTable`]
//! - answers or issues liveness challenges, closing peers that stop replying
//!
//! [`MessageRegistry`]: polynet_registry::MessageRegistry

pub mod config;
pub mod connector;
pub mod control;
pub mod error;
pub mod handler;
pub mod listener;
mod liveness;
pub mod outbound;
mod session;

#[cfg(test)]
mod testing;

pub use config::{LivenessConfig, LivenessRole, PeerConfig};
pub use connector::{connect, ClientSession};
pub use control::LivenessChallenge;
pub use error::{PeerError, Result};
pub use handler::{CloseReason, ConnectionId, Disposition, MessageHandler, ResponseBuffer};
pub use listener::PeerListener;
pub use outbound::{OutboundMessage, OutboundTable};
