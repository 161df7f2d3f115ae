use std::net::SocketAddr;

/// Errors that can occur in TCP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the accept loop should keep going after this failure.
    ///
    /// Covers failures that only concern the connection being accepted and
    /// process-wide resource exhaustion, which clears once connections close.
    pub fn is_transient_accept(&self) -> bool {
        match self {
            TransportError::Accept(err) => {
                matches!(
                    err.kind(),
                    std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::Interrupted
                        | std::io::ErrorKind::WouldBlock
                ) || is_resource_exhaustion(err)
            }
            _ => false,
        }
    }

    /// Whether accepting failed for lack of descriptors, buffers or memory.
    ///
    /// Retrying immediately would spin, so callers back off first.
    pub fn is_resource_exhausted(&self) -> bool {
        match self {
            TransportError::Accept(err) => is_resource_exhaustion(err),
            _ => false,
        }
    }
}

fn is_resource_exhaustion(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::OutOfMemory {
        return true;
    }
    #[cfg(unix)]
    {
        matches!(
            err.raw_os_error(),
            Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
        )
    }
    #[cfg(not(unix))]
    {
        false
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
