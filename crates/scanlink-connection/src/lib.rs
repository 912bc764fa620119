//! Connection lifecycle management for Scanlink.
//!
//! This crate owns the one socket a scanner keeps to its server:
//!
//! 1. **State**: [`ConnectionState`], observable through
//!    [`ConnectionManager::subscribe`]
//! 2. **Reconnection**: bounded attempts with a fixed delay
//!    ([`ReconnectPolicy`]), driven by a non-blocking Tokio timer
//! 3. **Messaging**: barcodes out, server errors in, via the JSON codec
//! 4. **Reporting**: human-readable updates to a [`StatusSink`]
//!
//! # How it fits in the stack
//!
//! ```text
//! Bridge (above)  ← feeds scans in, shows status
//!     ↕
//! Connection Layer (this crate)  ← state machine + retry policy
//!     ↕
//! Protocol + Transport (below)  ← frames and sockets
//! ```

mod error;
mod manager;
mod state;
mod status;

pub use error::ConnectionError;
pub use manager::ConnectionManager;
pub use state::{ConnectionState, ReconnectPolicy};
pub use status::{StatusSink, TracingStatus, WatchStatus};
