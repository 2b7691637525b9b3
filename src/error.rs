//! Error types for the game link client.
//!
//! None of these errors are allowed to escape as a crash. Each one is
//! logged where it occurs and the client degrades to a recoverable state.

use thiserror::Error;

/// Errors that can occur when using the game link client.
#[derive(Debug, Error)]
pub enum GameLinkError {
    /// Failed to send a message through the transport.
    #[error("transport send error: {0}")]
    TransportSend(String),

    /// Failed to receive a message from the transport.
    #[error("transport receive error: {0}")]
    TransportReceive(String),

    /// The transport connection was closed unexpectedly.
    #[error("transport connection closed")]
    TransportClosed,

    /// A connection attempt could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Failed to serialize an outgoing message.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An inbound frame was not a valid `{ "Type": ..., "Data": ... }` envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// An inbound envelope carried a tag with no registered route.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// The envelope was valid but its payload did not match the schema for its tag.
    #[error("failed to decode {tag} payload: {source}")]
    PayloadDecode {
        /// Tag of the envelope whose payload failed to decode.
        tag: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Attempted an operation that requires an open connection.
    #[error("not connected to server")]
    NotConnected,

    /// An operation timed out.
    #[error("operation timed out")]
    Timeout,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A subscriber or scheduled action failed while running on the consumer thread.
    #[error("handler error: {0}")]
    Handler(String),
}

impl GameLinkError {
    /// Returns `true` for the decode family of errors (malformed frame,
    /// unknown tag, payload mismatch). These are never fatal.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedEnvelope(_) | Self::UnknownMessageType(_) | Self::PayloadDecode { .. }
        )
    }
}

/// A specialized [`Result`] type for game link operations.
pub type Result<T> = std::result::Result<T, GameLinkError>;
