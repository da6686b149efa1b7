//! Error types
//!
//! Transport failures surface as [`Error::Io`]. The wire format itself has
//! almost no failure modes: short input is "need more data", not an error.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Connect, accept, read or write failure
    Io(io::Error),
    /// Frame could not be accepted
    Protocol(ProtocolError),
    /// Command issued while the client holds an active subscription
    ClientSubscribed,
    /// Command issued before `connect`
    NotConnected,
    /// Peer closed the stream
    ConnectionClosed,
}

/// Wire protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Declared payload length exceeds what the receiver accepts
    FrameTooLarge {
        /// Payload length from the frame header
        declared: u64,
        /// Largest payload the receiver accepts
        max: u64,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::ClientSubscribed => write!(
                f,
                "client is subscribed, command cannot be executed until the client unsubscribes"
            ),
            Error::NotConnected => write!(f, "client is not connected"),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::FrameTooLarge { declared, max } => write!(
                f,
                "frame payload of {} bytes exceeds limit of {} bytes",
                declared, max
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ProtocolError {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}
