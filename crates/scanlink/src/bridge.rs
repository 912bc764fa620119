//! `ScannerBridge`: scan source in, connection out.
//!
//! This is the entry point for running a scanner. It owns the
//! [`ConnectionManager`] and the [`ScanSource`], and runs the loop that
//! moves each scanned code from one to the other.

use std::future::Future;
use std::sync::Arc;

use scanlink_connection::{ConnectionManager, ConnectionState, StatusSink};
use scanlink_transport::Transport;
use tokio::sync::{mpsc, watch};

use crate::{BridgeConfig, ScanSource, ScanlinkError};

/// Reason given to the server when the bridge stops.
const STOP_REASON: &str = "Bridge stopped";

/// Forwards scans from a [`ScanSource`] to the server.
///
/// # Example
///
/// ```rust,ignore
/// let bridge = ScannerBridge::new(&config, WebSocketTransport::new(), source, status);
/// bridge.run(async { let _ = tokio::signal::ctrl_c().await; }).await?;
/// ```
pub struct ScannerBridge<T: Transport, S: ScanSource> {
    manager: ConnectionManager<T>,
    source: S,
    status: Arc<dyn StatusSink>,
    scan_buffer: usize,
    last_scan: watch::Sender<Option<String>>,
}

impl<T: Transport, S: ScanSource> ScannerBridge<T, S> {
    /// Creates a bridge. The endpoint (with client id) is fixed here for
    /// the bridge's whole lifetime.
    pub fn new(
        config: &BridgeConfig,
        transport: T,
        source: S,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let manager = ConnectionManager::new(
            transport,
            config.endpoint(),
            config.reconnect_policy(),
            Arc::clone(&status),
        );
        let (last_scan, _) = watch::channel(None);
        Self {
            manager,
            source,
            status,
            scan_buffer: config.scan_buffer.max(1),
            last_scan,
        }
    }

    /// The connection this bridge drives.
    ///
    /// Useful for a manual "reconnect" control (`manager().connect()`)
    /// after the connection has failed or been closed by the server.
    pub fn manager(&self) -> &ConnectionManager<T> {
        &self.manager
    }

    /// Observes connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.manager.subscribe()
    }

    /// Observes the most recent scanned code, sent or not.
    pub fn subscribe_last_scan(&self) -> watch::Receiver<Option<String>> {
        self.last_scan.subscribe()
    }

    /// Runs until `shutdown` resolves or the scan source runs dry.
    ///
    /// Starts the scan source, opens the connection, then forwards every
    /// scan. On the way out the source is stopped and the connection
    /// closed with reason "Bridge stopped".
    ///
    /// # Errors
    /// Returns [`ScanlinkError::Scan`] if the scan source cannot start.
    /// Connection problems are never returned; they show up in the status
    /// sink and drive reconnection instead.
    pub async fn run(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), ScanlinkError> {
        let (tx, mut scans) = mpsc::channel(self.scan_buffer);
        if let Err(e) = self.source.start(tx) {
            tracing::error!(error = %e, "scan source failed to start");
            self.status
                .update(&format!("Scanner initialization failed: {e}"));
            return Err(e.into());
        }
        self.status.update("Scanner ready");
        tracing::info!(endpoint = %self.manager.endpoint(), "scanner bridge running");

        self.manager.connect();

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                scan = scans.recv() => match scan {
                    Some(code) => self.forward(&code),
                    None => {
                        tracing::info!("scan source finished");
                        break;
                    }
                },
            }
        }

        self.source.stop();
        self.manager.disconnect(STOP_REASON);
        Ok(())
    }

    fn forward(&self, code: &str) {
        self.last_scan.send_replace(Some(code.to_owned()));
        if let Err(e) = self.manager.send(code) {
            tracing::debug!(%code, error = %e, "scan not forwarded");
        }
    }
}
