//! Wire protocol for Scanlink.
//!
//! This crate defines the messages a scanner and the bridge server
//! exchange, and how they are turned into frames:
//!
//! - **Types** ([`OutboundMessage`], [`InboundMessage`]): what travels on
//!   the wire.
//! - **Codec** ([`JsonCodec`]): UTF-8 JSON text frames, internally tagged
//!   by a `type` field.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding.
//!
//! Decoding never fails: anything the scanner does not understand becomes
//! [`InboundMessage::Unknown`].
//!
//! ```text
//! Transport (bytes) → Protocol (messages) → Connection (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{InboundMessage, OutboundMessage};
