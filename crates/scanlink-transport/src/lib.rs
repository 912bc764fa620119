//! Transport abstraction layer for Scanlink.
//!
//! Provides the [`Transport`] and [`Connection`] traits for an outbound,
//! callback-driven message socket, plus the [`TransportEvents`] trait the
//! owner of a connection implements to hear about it.
//!
//! The shape follows the platform socket APIs the scanner was built on:
//! `open` returns a handle immediately, the handshake runs in the
//! background, and everything that happens afterwards (open, inbound
//! frames, failures, peer close) is reported through callbacks.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket transport via `tokio-tungstenite`
//! - `tls`: enables `wss://` endpoints through `native-tls`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::sync::Arc;

/// WebSocket close code for a normal, locally requested closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Whether this build can open `wss://` endpoints (the `tls` feature).
pub const TLS_ENABLED: bool = cfg!(feature = "tls");

/// Identifier the owner assigns to each opened connection.
///
/// Owners use it as a generation tag: callbacks are delivered through a
/// listener bound to one id, so events from an abandoned connection can be
/// told apart from events of its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Receives everything that happens on one opened connection.
///
/// Callbacks may arrive on any thread. After `on_failure` or `on_closed`
/// no further callbacks are delivered for that connection.
pub trait TransportEvents: Send + Sync + 'static {
    /// The handshake completed; the connection can carry frames.
    fn on_open(&self);

    /// A frame arrived from the peer.
    fn on_message(&self, data: Vec<u8>);

    /// The connection failed (during the handshake or afterwards).
    fn on_failure(&self, error: TransportError);

    /// The peer closed the connection with a close handshake.
    fn on_closed(&self, code: u16, reason: String);
}

/// Opens outbound connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection handle produced by this transport.
    type Connection: Connection;

    /// Starts connecting to `endpoint` and returns a handle right away.
    ///
    /// The outcome is reported later through `events`. Implementations
    /// must not invoke any callback before `open` has returned.
    fn open(
        &self,
        endpoint: &str,
        id: ConnectionId,
        events: Arc<dyn TransportEvents>,
    ) -> Self::Connection;
}

/// A handle to one opened connection.
pub trait Connection: Send + Sync + 'static {
    /// Queues a frame for the peer without waiting for the network.
    ///
    /// An `Err` means the connection is already unusable. Failures that
    /// happen while the frame is being written are reported through
    /// [`TransportEvents::on_failure`].
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Closes the connection. No callbacks follow a local close.
    fn close(&self, code: u16, reason: &str);

    /// Returns the identifier this connection was opened with.
    fn id(&self) -> ConnectionId;
}
