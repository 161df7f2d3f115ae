use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};

/// Listening TCP socket.
///
/// Dropping the transport releases the port.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr`. Port `0` picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(%local_addr, "listening on tcp socket");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Wait for the next inbound stream.
    ///
    /// Cancel-safe: dropping the future never loses an accepted stream.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        // Frames are small and latency-sensitive; Nagle only adds delay.
        if let Err(err) = stream.set_nodelay(true) {
            warn!(%peer, error = %err, "failed to disable nagle on accepted stream");
        }
        debug!(%peer, "accepted connection");
        Ok((stream, peer))
    }

    /// Address the socket is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Establish one outbound stream to `addr`.
pub async fn connect(addr: SocketAddr) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| TransportError::Connect { addr, source })?;
    stream.set_nodelay(true)?;
    debug!(%addr, "connected");
    Ok(stream)
}
