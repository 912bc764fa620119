//! Message types for Scanlink's wire format.
//!
//! The protocol is asymmetric: the scanner only ever sends
//! [`OutboundMessage`]s and only ever interprets [`InboundMessage`]s.

use serde::Serialize;

// ---------------------------------------------------------------------------
// OutboundMessage: scanner → server
// ---------------------------------------------------------------------------

/// A message the scanner sends to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON with the tag
/// first, which is the exact shape the bridge server expects:
///   `{"type":"barcode","code":"012345678905"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// One decoded barcode, exactly as the scan source produced it.
    Barcode { code: String },
}

impl OutboundMessage {
    /// Shorthand for [`OutboundMessage::Barcode`].
    pub fn barcode(code: impl Into<String>) -> Self {
        Self::Barcode { code: code.into() }
    }
}

// ---------------------------------------------------------------------------
// InboundMessage: server → scanner
// ---------------------------------------------------------------------------

/// A message received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// `{"type":"error","message":"..."}`: the server rejected something.
    /// `message` is empty when the server left it out.
    Error { message: String },

    /// Any other frame, kept verbatim (lossy UTF-8) for diagnostics.
    Unknown { raw: String },
}
