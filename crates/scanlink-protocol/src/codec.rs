//! JSON codec for Scanlink frames.
//!
//! Encoding goes through serde so the tag order and string escaping are
//! exactly what `serde_json` produces. Decoding is deliberately lenient:
//! the scanner only acts on `error` frames, so it parses into a
//! [`serde_json::Value`] and inspects the `type` field by hand instead of
//! deriving `Deserialize` for a closed set of variants.

use serde_json::Value;

use crate::{InboundMessage, OutboundMessage, ProtocolError};

/// Encodes outbound messages and decodes inbound frames as JSON.
///
/// ## Example
///
/// ```rust
/// use scanlink_protocol::{InboundMessage, JsonCodec};
///
/// let codec = JsonCodec;
///
/// let frame = codec.encode_barcode("012345678905").unwrap();
/// assert_eq!(frame, br#"{"type":"barcode","code":"012345678905"}"#);
///
/// let msg = codec.decode(br#"{"type":"error","message":"rate limited"}"#);
/// assert_eq!(msg, InboundMessage::Error { message: "rate limited".into() });
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    /// Serializes an outbound message into a UTF-8 JSON frame.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails. Every
    /// current message holds only strings, so in practice this is `Ok`
    /// for any input, including empty strings and control characters
    /// (they are escaped, not rejected).
    pub fn encode(
        &self,
        message: &OutboundMessage,
    ) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(message)?)
    }

    /// Encodes `{"type":"barcode","code":<code>}`.
    pub fn encode_barcode(&self, code: &str) -> Result<Vec<u8>, ProtocolError> {
        self.encode(&OutboundMessage::barcode(code))
    }

    /// Decodes one inbound frame. Never fails.
    ///
    /// A JSON object whose string field `type` is `"error"` becomes
    /// [`InboundMessage::Error`]. Everything else (other types, a missing
    /// or non-string `type`, non-object JSON, malformed or non-UTF-8
    /// bytes) becomes [`InboundMessage::Unknown`] carrying the input.
    pub fn decode(&self, data: &[u8]) -> InboundMessage {
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(data) else {
            return unknown(data);
        };

        match fields.get("type").and_then(Value::as_str) {
            Some("error") => InboundMessage::Error {
                message: match fields.get("message") {
                    Some(Value::String(message)) => message.clone(),
                    None | Some(Value::Null) => String::new(),
                    // Non-string messages are shown as their JSON text.
                    Some(other) => other.to_string(),
                },
            },
            _ => unknown(data),
        }
    }
}

fn unknown(data: &[u8]) -> InboundMessage {
    InboundMessage::Unknown {
        raw: String::from_utf8_lossy(data).into_owned(),
    }
}
