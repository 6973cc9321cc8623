//! Error types
//!
//! [`Error`] covers transport failures that end a connection or the server.
//! [`SignalError`] covers everything that can go wrong while handling a
//! single signaling message; those are logged and the connection continues.

use thiserror::Error;

use crate::registry::{ConnectionId, RegistryError, RoomId};

/// Crate-level result type
pub type Result<T> = std::result::Result<T, Error>;

/// Transport and server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Socket I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encoding failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client did not complete the WebSocket upgrade in time
    #[error("WebSocket handshake timed out")]
    HandshakeTimeout,
}

/// Failures while handling one signaling message
#[derive(Error, Debug)]
pub enum SignalError {
    /// Room id unknown or already removed
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// Payload does not match the message kind's schema
    #[error("invalid {kind} payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    /// Well-formed message that the protocol does not allow
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Outbound envelope could not be handed to the peer's transport
    #[error("delivery to connection {0} failed")]
    DeliveryFailure(ConnectionId),

    /// No free room id could be allocated
    #[error("room id space exhausted")]
    RegistryExhausted,

    /// Candidate buffer of a room is full and nobody can receive it
    #[error("candidate buffer of room {0} is full")]
    CandidateBufferFull(RoomId),

    /// Unrecognized envelope type
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// Outbound envelope could not be encoded
    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<RegistryError> for SignalError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::RoomNotFound(id) => SignalError::RoomNotFound(id),
            RegistryError::Exhausted => SignalError::RegistryExhausted,
        }
    }
}

impl SignalError {
    /// Whether this is an expected outcome rather than a client mistake
    ///
    /// Stale room ids and unknown message kinds are routine; the connection
    /// loop logs them at a lower level.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            SignalError::RoomNotFound(_) | SignalError::UnknownType(_)
        )
    }
}
