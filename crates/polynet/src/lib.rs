//! Typed message transport for multiplayer game servers.
//!
//! polynet moves registered message types between a central server and many
//! connected clients over TCP, and reclaims peers that stop answering
//! liveness challenges.
//!
//! # Crate Structure
//!
//! - [`transport`] — TCP bind, accept and connect
//! - [`frame`] — Big-endian field codec and length-prefixed framing
//! - [`registry`] — Message trait and the id <-> type registry
//! - [`peer`] — Connection loops, push table, liveness (behind `peer` feature)
//! - [`lobby`] — Reference lobby protocol built on the layers above (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use polynet_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use polynet_frame::*;
}

/// Re-export registry types.
pub mod registry {
    pub use polynet_registry::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use polynet_peer::*;
}

#[cfg(feature = "peer")]
pub mod lobby;
