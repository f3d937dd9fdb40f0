use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum TallWorldError {
    /// The data server executable could not be started.
    ProcessLaunch(std::io::Error),
    /// The peer closed the socket before a full frame arrived.
    ConnectionClosed,
    /// The server answered with its closing packet.
    ServerClosing,
    /// Malformed or unexpected frame. The connection is out of sync.
    Protocol(String),
    IoError(std::io::Error),
    /// A payload decoded but does not have the expected tag layout.
    Nbt(String),
    SessionLockLost(String),
    Metadata(String),
    Config(String),
    /// The world handle was closed or failed earlier.
    WorldClosed,
}

impl TallWorldError {
    /// Whether the world handle must be closed after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TallWorldError::ProcessLaunch(_)
                | TallWorldError::ConnectionClosed
                | TallWorldError::ServerClosing
                | TallWorldError::Protocol(_)
                | TallWorldError::IoError(_)
                | TallWorldError::WorldClosed
        )
    }
}

impl fmt::Display for TallWorldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TallWorldError::ProcessLaunch(err) => write!(f, "Failed to launch data server: {}", err),
            TallWorldError::ConnectionClosed => write!(f, "Connection closed by data server"),
            TallWorldError::ServerClosing => write!(f, "Data server is closing"),
            TallWorldError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            TallWorldError::IoError(err) => write!(f, "IO error: {}", err),
            TallWorldError::Nbt(msg) => write!(f, "NBT error: {}", msg),
            TallWorldError::SessionLockLost(msg) => write!(f, "Session lock lost: {}", msg),
            TallWorldError::Metadata(msg) => write!(f, "Metadata error: {}", msg),
            TallWorldError::Config(msg) => write!(f, "Config error: {}", msg),
            TallWorldError::WorldClosed => write!(f, "World is closed"),
        }
    }
}

impl Error for TallWorldError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TallWorldError::ProcessLaunch(err) | TallWorldError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TallWorldError {
    fn from(err: std::io::Error) -> Self {
        TallWorldError::IoError(err)
    }
}
