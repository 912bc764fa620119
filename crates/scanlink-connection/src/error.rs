//! Error types for the connection layer.

use scanlink_protocol::ProtocolError;
use scanlink_transport::TransportError;

/// Everything that can go wrong with the scanner's connection.
///
/// Only [`NotConnected`](Self::NotConnected) and [`Encode`](Self::Encode)
/// are ever returned to callers. The transport variants are caught by the
/// [`ConnectionManager`](crate::ConnectionManager), turned into state
/// transitions, and reported through the status sink.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection could not be established.
    #[error("could not connect: {0}")]
    TransportOpen(#[source] TransportError),

    /// Writing a frame to an open connection failed.
    #[error("write failed: {0}")]
    TransportWrite(#[source] TransportError),

    /// An open connection broke without a close handshake.
    #[error("connection lost: {0}")]
    TransportLost(#[source] TransportError),

    /// The server closed the connection.
    #[error("closed by server (code {code}): {reason}")]
    ClosedByPeer { code: u16, reason: String },

    /// A send was attempted while not connected; the message was dropped.
    #[error("not connected")]
    NotConnected,

    /// Every reconnect attempt failed. A new `connect()` is required.
    #[error("gave up after {0} attempts")]
    RetriesExhausted(u32),

    /// The outbound message could not be encoded.
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}
