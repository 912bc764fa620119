//! # Scanlink
//!
//! Forwards barcode scans to a server over a persistent WebSocket and
//! reports connection state back to whoever is watching.
//!
//! The heavy lifting lives in the sub-crates: `scanlink-transport` (the
//! socket), `scanlink-protocol` (the JSON frames) and `scanlink-connection`
//! (the lifecycle state machine). This crate ties them together with a
//! [`ScannerBridge`], a [`BridgeConfig`] read from the environment, and the
//! [`ScanSource`] trait that scanning hardware plugs into.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanlink::prelude::*;
//!
//! # async fn run() -> Result<(), ScanlinkError> {
//! let config = BridgeConfig::from_env()?;
//! let bridge = ScannerBridge::new(
//!     &config,
//!     WebSocketTransport::new(),
//!     LineScanSource::stdin(),
//!     std::sync::Arc::new(TracingStatus),
//! );
//! bridge.run(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod bridge;
mod config;
mod error;
mod scan;
mod telemetry;

pub use bridge::ScannerBridge;
pub use config::{BridgeConfig, Environment};
pub use error::ScanlinkError;
pub use scan::{LineScanSource, ScanError, ScanSource};
pub use telemetry::init_tracing;

pub use scanlink_connection::{
    ConnectionError, ConnectionManager, ConnectionState, ReconnectPolicy,
    StatusSink, TracingStatus, WatchStatus,
};
pub use scanlink_protocol::{InboundMessage, JsonCodec, OutboundMessage, ProtocolError};
pub use scanlink_transport::{
    Connection, ConnectionId, Transport, TransportError, TransportEvents,
    WebSocketTransport,
};

/// Everything needed to wire up a scanner in one import.
pub mod prelude {
    pub use crate::{
        BridgeConfig, ConnectionManager, ConnectionState, Environment,
        LineScanSource, ReconnectPolicy, ScanSource, ScanlinkError,
        ScannerBridge, StatusSink, TracingStatus, WatchStatus,
        WebSocketTransport,
    };
}
