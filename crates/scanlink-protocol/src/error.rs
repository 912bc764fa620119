//! Error types for the protocol layer.

/// Errors that can occur in the protocol layer.
///
/// Only encoding can fail. Malformed inbound frames are not errors; they
/// decode to [`InboundMessage::Unknown`](crate::InboundMessage::Unknown).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into bytes).
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
