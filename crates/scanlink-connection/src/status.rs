//! Status sinks: where human-readable connection updates go.

use tokio::sync::watch;

/// Receives a status line on every state transition and notable event
/// (connected, disconnected, scan sent or dropped, server error).
///
/// Each update replaces the previous one; sinks that display status should
/// show only the latest. Updates are delivered from whichever thread
/// caused them, while the manager holds its internal lock, so a sink must
/// not call back into the [`ConnectionManager`](crate::ConnectionManager)
/// and should hand off to its own thread if it needs one.
pub trait StatusSink: Send + Sync + 'static {
    /// Replaces the current status.
    fn update(&self, status: &str);
}

/// A status sink backed by a `watch` channel: readers always see the
/// latest status and are woken when it changes.
#[derive(Debug)]
pub struct WatchStatus {
    tx: watch::Sender<String>,
}

impl WatchStatus {
    /// Creates the sink and a receiver for it. The initial status is empty.
    pub fn new() -> (Self, watch::Receiver<String>) {
        let (tx, rx) = watch::channel(String::new());
        (Self { tx }, rx)
    }

    /// Returns another receiver for the same status.
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.tx.subscribe()
    }
}

impl StatusSink for WatchStatus {
    fn update(&self, status: &str) {
        self.tx.send_replace(status.to_owned());
    }
}

/// A status sink that writes every update to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn update(&self, status: &str) {
        tracing::info!(target: "scanlink::status", %status, "status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_status_keeps_only_latest() {
        let (sink, rx) = WatchStatus::new();
        assert_eq!(*rx.borrow(), "");

        sink.update("Connecting to server");
        sink.update("Connected to server");

        assert_eq!(*rx.borrow(), "Connected to server");
    }

    #[test]
    fn test_watch_status_works_without_receivers() {
        let (sink, rx) = WatchStatus::new();
        drop(rx);
        sink.update("nobody listening");
        assert_eq!(*sink.subscribe().borrow(), "nobody listening");
    }
}
