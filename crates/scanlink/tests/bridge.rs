//! End-to-end tests: scan source → bridge → real WebSocket server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use scanlink::prelude::*;
use scanlink::ScanError;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};

// =========================================================================
// Test scan sources
// =========================================================================

/// A scan source the test drives by hand.
#[derive(Clone, Default)]
struct HandheldScanner {
    sender: Arc<Mutex<Option<mpsc::Sender<String>>>>,
}

impl HandheldScanner {
    async fn scan(&self, code: &str) {
        let sender = self
            .sender
            .lock()
            .unwrap()
            .clone()
            .expect("scanner should be started");
        sender.send(code.to_string()).await.unwrap();
    }
}

impl ScanSource for HandheldScanner {
    fn start(&mut self, scans: mpsc::Sender<String>) -> Result<(), ScanError> {
        *self.sender.lock().unwrap() = Some(scans);
        Ok(())
    }

    fn stop(&mut self) {
        self.sender.lock().unwrap().take();
    }
}

/// A scanner whose hardware never comes up.
struct BrokenScanner;

impl ScanSource for BrokenScanner {
    fn start(&mut self, _scans: mpsc::Sender<String>) -> Result<(), ScanError> {
        Err(ScanError::Unavailable("decoder not found".into()))
    }

    fn stop(&mut self) {}
}

// =========================================================================
// Helpers
// =========================================================================

const WAIT: Duration = Duration::from_secs(5);

async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ws://{addr}/?type=scanner"))
}

fn config(endpoint_url: String) -> BridgeConfig {
    BridgeConfig {
        endpoint_url,
        client_id: "test-scanner".into(),
        ..BridgeConfig::default()
    }
}

async fn wait_status(rx: &mut watch::Receiver<String>, needle: &str) -> String {
    tokio::time::timeout(WAIT, rx.wait_for(|s| s.contains(needle)))
        .await
        .unwrap_or_else(|_| panic!("status never contained {needle:?}"))
        .expect("status sink should stay alive")
        .clone()
}

async fn wait_state(rx: &mut watch::Receiver<ConnectionState>, state: ConnectionState) {
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("state never became {state}"))
        .expect("manager should stay alive");
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_scan_reaches_server_and_server_errors_reach_status() {
    let (listener, url) = listen().await;
    let scanner = HandheldScanner::default();
    let (status, mut status_rx) = WatchStatus::new();

    let bridge = ScannerBridge::new(
        &config(url),
        WebSocketTransport::new(),
        scanner.clone(),
        Arc::new(status),
    );
    let mut states = bridge.subscribe_state();
    let last_scan = bridge.subscribe_last_scan();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(bridge.run(async move {
        let _ = stop_rx.await;
    }));

    // --- Server accepts and sees the scanner's identity ---
    let (stream, _) = listener.accept().await.unwrap();
    let mut uri = String::new();
    let mut server = tokio_tungstenite::accept_hdr_async(
        stream,
        |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            uri = req.uri().to_string();
            Ok(resp)
        },
    )
    .await
    .unwrap();
    assert_eq!(uri, "/?type=scanner&clientId=test-scanner");

    wait_state(&mut states, ConnectionState::Connected).await;

    // --- A scan becomes an exact barcode frame ---
    scanner.scan("012345678905").await;
    let frame = tokio::time::timeout(WAIT, server.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let text = match frame {
        Message::Text(text) => text,
        other => panic!("expected a text frame, got {other:?}"),
    };
    assert_eq!(text.as_str(), r#"{"type":"barcode","code":"012345678905"}"#);
    let json: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "type": "barcode", "code": "012345678905" })
    );
    wait_status(&mut status_rx, "012345678905").await;
    assert_eq!(last_scan.borrow().as_deref(), Some("012345678905"));

    // --- A server error is shown, the connection stays up ---
    server
        .send(Message::Text(
            r#"{"type":"error","message":"rate limited"}"#.into(),
        ))
        .await
        .unwrap();
    wait_status(&mut status_rx, "rate limited").await;
    assert_eq!(*states.borrow(), ConnectionState::Connected);

    // --- Shutdown closes the socket with a reason ---
    stop_tx.send(()).unwrap();
    running.await.unwrap().unwrap();

    match tokio::time::timeout(WAIT, server.next()).await.unwrap() {
        Some(Ok(Message::Close(Some(close)))) => {
            assert_eq!(u16::from(close.code), 1000);
            assert_eq!(close.reason.as_str(), "Bridge stopped");
        }
        other => panic!("expected close frame, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scan_while_not_connected_is_dropped_and_reported() {
    // Nothing listens on this port, and the retry is far away.
    let (listener, url) = listen().await;
    drop(listener);
    let scanner = HandheldScanner::default();
    let (status, mut status_rx) = WatchStatus::new();
    let config = BridgeConfig {
        reconnect_delay_ms: 60_000,
        ..config(url)
    };

    let bridge = ScannerBridge::new(
        &config,
        WebSocketTransport::new(),
        scanner.clone(),
        Arc::new(status),
    );
    let last_scan = bridge.subscribe_last_scan();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(bridge.run(async move {
        let _ = stop_rx.await;
    }));

    wait_status(&mut status_rx, "Connection failed").await;

    scanner.scan("4006381333931").await;
    wait_status(&mut status_rx, "Not connected - scan not sent").await;
    assert_eq!(last_scan.borrow().as_deref(), Some("4006381333931"));

    stop_tx.send(()).unwrap();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_broken_scan_source_fails_run_and_reports_status() {
    let (status, status_rx) = WatchStatus::new();
    let bridge = ScannerBridge::new(
        &config("ws://127.0.0.1:9/".into()),
        WebSocketTransport::new(),
        BrokenScanner,
        Arc::new(status),
    );
    let states = bridge.subscribe_state();

    let result = bridge.run(std::future::pending()).await;

    assert!(matches!(result, Err(ScanlinkError::Scan(ScanError::Unavailable(_)))));
    assert_eq!(
        *status_rx.borrow(),
        "Scanner initialization failed: scanner unavailable: decoder not found"
    );
    // The connection is never attempted without a scanner.
    assert_eq!(*states.borrow(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_run_ends_when_scan_source_runs_dry() {
    let (listener, url) = listen().await;
    let source = LineScanSource::new(|| std::io::Cursor::new(Vec::<u8>::new()));
    let (status, status_rx) = WatchStatus::new();

    let bridge = ScannerBridge::new(&config(url), WebSocketTransport::new(), source, Arc::new(status));
    let states = bridge.subscribe_state();

    tokio::time::timeout(WAIT, bridge.run(std::future::pending()))
        .await
        .expect("run should end on its own")
        .unwrap();

    assert_eq!(*states.borrow(), ConnectionState::Disconnected);
    assert_eq!(*status_rx.borrow(), "Disconnected: Bridge stopped");
    drop(listener);
}
