//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Each opened connection is driven by its own Tokio task. The handle
//! returned to the caller only holds the sending half of a command
//! channel, so `send` and `close` never wait on the network.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{Connection, ConnectionId, Transport, TransportError, TransportEvents};

/// Close code reported when the peer sent a close frame without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// How long to wait for the peer to finish a close handshake.
const CLOSE_LINGER: Duration = Duration::from_secs(5);

enum Command {
    Frame(Vec<u8>),
    Close { code: u16, reason: String },
}

/// A WebSocket-based [`Transport`] that opens client connections.
///
/// [`open`](Transport::open) spawns a task, so it must be called from
/// within a Tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    /// Creates a new WebSocket transport.
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;

    fn open(
        &self,
        endpoint: &str,
        id: ConnectionId,
        events: Arc<dyn TransportEvents>,
    ) -> Self::Connection {
        let (commands, rx) = mpsc::unbounded_channel();
        tracing::debug!(%id, endpoint, "opening WebSocket connection");
        tokio::spawn(drive(endpoint.to_owned(), id, events, rx));
        WebSocketConnection { id, commands }
    }
}

/// A single client WebSocket connection.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct WebSocketConnection {
    id: ConnectionId,
    commands: mpsc::UnboundedSender<Command>,
}

impl Connection for WebSocketConnection {
    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.commands
            .send(Command::Frame(data.to_vec()))
            .map_err(|_| {
                TransportError::ConnectionClosed(
                    "connection task has exited".into(),
                )
            })
    }

    fn close(&self, code: u16, reason: &str) {
        // The task may already be gone; nothing to close then.
        let _ = self.commands.send(Command::Close {
            code,
            reason: reason.to_owned(),
        });
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Runs one connection from handshake to close.
async fn drive(
    endpoint: String,
    id: ConnectionId,
    events: Arc<dyn TransportEvents>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let connect = tokio_tungstenite::connect_async(endpoint.as_str());
    tokio::pin!(connect);

    let ws = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((ws, _response)) => break ws,
                Err(e) => {
                    tracing::debug!(%id, error = %e, "WebSocket handshake failed");
                    events.on_failure(TransportError::ConnectFailed(
                        io::Error::new(io::ErrorKind::ConnectionRefused, e),
                    ));
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Frame(_)) => {
                    tracing::debug!(%id, "dropping frame queued before open");
                }
                Some(Command::Close { .. }) | None => {
                    tracing::debug!(%id, "connection abandoned before open");
                    return;
                }
            },
        }
    };

    tracing::debug!(%id, "WebSocket connection open");
    events.on_open();

    let (mut sink, mut stream) = ws.split();
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Frame(data)) => {
                    if let Err(e) = sink.send(frame(data)).await {
                        events.on_failure(TransportError::SendFailed(
                            io::Error::new(io::ErrorKind::BrokenPipe, e),
                        ));
                        return;
                    }
                }
                Some(Command::Close { code, reason }) => {
                    let close = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    if let Err(e) = sink.send(Message::Close(Some(close))).await {
                        tracing::debug!(%id, error = %e, "close frame not delivered");
                        return;
                    }
                    finish_close(id, &mut stream).await;
                    return;
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    events.on_message(text.as_bytes().to_vec());
                }
                Some(Ok(Message::Binary(data))) => {
                    events.on_message(data.into());
                }
                Some(Ok(Message::Close(close))) => {
                    let (code, reason) = close
                        .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    tracing::debug!(%id, code, %reason, "peer closed connection");
                    events.on_closed(code, reason);
                    // Reading on flushes tungstenite's queued close reply.
                    finish_close(id, &mut stream).await;
                    return;
                }
                Some(Ok(_)) => {} // ping/pong/raw frame
                Some(Err(e)) => {
                    events.on_failure(TransportError::ReceiveFailed(
                        io::Error::new(io::ErrorKind::ConnectionReset, e),
                    ));
                    return;
                }
                None => {
                    events.on_failure(TransportError::ConnectionClosed(
                        "stream ended without a close frame".into(),
                    ));
                    return;
                }
            },
        }
    }
}

/// Reads until the peer drops the socket so the close handshake completes.
async fn finish_close<S>(id: ConnectionId, stream: &mut S)
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    let drain = async { while let Some(Ok(_)) = stream.next().await {} };
    if tokio::time::timeout(CLOSE_LINGER, drain).await.is_err() {
        tracing::debug!(%id, "peer did not finish close handshake");
    }
}

/// Wraps outbound bytes in a text frame when they are UTF-8.
fn frame(data: Vec<u8>) -> Message {
    match String::from_utf8(data) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}
