//! Crate-wide error types
//!
//! Errors that cross the wire are never surfaced through this module; they
//! travel as fields inside the response messages. These types cover local
//! failures: socket I/O, malformed frames, registration refusals, and
//! call-site validation in the client helper.

use crate::registry::RegistryError;

/// Convenience result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Socket or stream I/O failure
    Io(std::io::Error),
    /// Wire protocol violation
    Protocol(ProtocolError),
    /// Registry operation failure
    Registry(RegistryError),
    /// An endpoint call did not complete within the configured deadline
    Timeout,
    /// A request was rejected before sending (client-side validation)
    InvalidRequest(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Timeout => write!(f, "Endpoint call timed out"),
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Registry(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(ProtocolError::Codec(e.to_string()))
    }
}

/// Wire protocol errors
#[derive(Debug)]
pub enum ProtocolError {
    /// Frame did not start with the protocol magic
    BadMagic([u8; 4]),
    /// Frame payload exceeds the size limit
    FrameTooLarge(usize),
    /// Payload failed to encode or decode
    Codec(String),
    /// A message arrived that is not valid in the current state
    UnexpectedMessage(String),
    /// Peer closed the connection mid-exchange
    ConnectionClosed,
    /// Broker refused the endpoint's registration
    Registration(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::BadMagic(bytes) => write!(f, "Bad frame magic: {:02x?}", bytes),
            ProtocolError::FrameTooLarge(len) => write!(f, "Frame too large: {} bytes", len),
            ProtocolError::Codec(msg) => write!(f, "Codec failure: {}", msg),
            ProtocolError::UnexpectedMessage(msg) => write!(f, "Unexpected message: {}", msg),
            ProtocolError::ConnectionClosed => write!(f, "Connection closed"),
            ProtocolError::Registration(msg) => write!(f, "Registration refused: {}", msg),
        }
    }
}

impl std::error::Error for ProtocolError {}
