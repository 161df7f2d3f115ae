//! TCP stream transport for polynet.
//!
//! This is the lowest layer of polynet: it binds listening sockets, accepts
//! peers and dials servers. Everything above it works on the plain
//! [`tokio::net::TcpStream`] halves handed out here.

pub mod error;
pub mod tcp;

pub use error::{Result, TransportError};
pub use tcp::{connect, TcpTransport};
