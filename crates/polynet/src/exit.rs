use std::fmt;
use std::io;

use polynet::frame::FrameError;
use polynet::lobby::LobbyError;
use polynet::peer::PeerError;
use polynet::transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrInUse
        | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let message = format!("{context}: {err}");
    let source = match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => source,
    };
    CliError {
        message,
        ..io_error(context, source)
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::WriteTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::ConnectionClosed | FrameError::IncompleteFrame { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::Registry(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        PeerError::InvalidConfig(_) => CliError::new(USAGE, format!("{context}: {err}")),
        PeerError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn lobby_error(context: &str, err: LobbyError) -> CliError {
    match err {
        LobbyError::Peer(err) => peer_error(context, err),
        LobbyError::Registry(err) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        LobbyError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        LobbyError::Closed(_) | LobbyError::Rejected(_) => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
    }
}
