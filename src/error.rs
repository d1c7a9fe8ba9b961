use std::error::Error;
use std::fmt;
use std::io;

use crate::network::protocol::ProtocolError;

/// Crate-level error for everything outside a single packet decode.
#[derive(Debug)]
pub enum RealmError {
    /// Socket, file or thread-spawn failure.
    Io(io::Error),
    /// A packet that could not be encoded or decoded.
    Protocol(ProtocolError),
    /// A configuration file that is not valid JSON for `RealmConfig`.
    Config(serde_json::Error),
    /// A configuration that parsed but cannot run, such as a zero chunk size.
    InvalidConfig(String),
    /// The peer sent something other than the expected handshake reply.
    Handshake(String),
    /// The peer closed the connection before the handshake finished.
    Disconnected,
}

impl fmt::Display for RealmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RealmError::Io(err) => write!(f, "IO error: {}", err),
            RealmError::Protocol(err) => write!(f, "Protocol error: {}", err),
            RealmError::Config(err) => write!(f, "Config error: {}", err),
            RealmError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            RealmError::Handshake(msg) => write!(f, "Handshake failed: {}", msg),
            RealmError::Disconnected => write!(f, "Peer disconnected"),
        }
    }
}

impl Error for RealmError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RealmError::Io(err) => Some(err),
            RealmError::Protocol(err) => Some(err),
            RealmError::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for RealmError {
    fn from(err: io::Error) -> Self {
        RealmError::Io(err)
    }
}

impl From<ProtocolError> for RealmError {
    fn from(err: ProtocolError) -> Self {
        RealmError::Protocol(err)
    }
}

impl From<serde_json::Error> for RealmError {
    fn from(err: serde_json::Error) -> Self {
        RealmError::Config(err)
    }
}
