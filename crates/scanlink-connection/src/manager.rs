//! The connection manager: one socket, its state, and its retries.
//!
//! # Concurrency note
//!
//! Transport callbacks arrive on transport tasks while `connect`, `send`
//! and `disconnect` are called from elsewhere (typically the scan loop).
//! All of them go through one `std::sync::Mutex` guarding the state, the
//! attempt counter, the owned connection and the retry timer, so every
//! transition sees a consistent picture. The lock is never held across an
//! `.await`; nothing inside it touches the network directly, because
//! [`Connection::send`] and [`Connection::close`] only queue commands.
//!
//! Each opened connection gets a fresh [`ConnectionId`] and its own
//! listener. Callbacks whose id does not match the connection currently
//! owned are stale (from a connection that was already replaced or torn
//! down) and are dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use scanlink_protocol::{InboundMessage, JsonCodec};
use scanlink_transport::{
    Connection, ConnectionId, NORMAL_CLOSURE, Transport, TransportError,
    TransportEvents,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{ConnectionError, ConnectionState, ReconnectPolicy, StatusSink};

/// Owns the scanner's single connection and applies the reconnect policy.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ [Connecting] ──open──→ [Connected] ──send()──→ frames
///                  │    ↑                  │
///          failure │    │ retry timer      │ failure → [Connecting]
///                  ▼    │                  │ peer close / disconnect()
///          attempts left?                  ▼
///            no → [Failed]           [Disconnected]
/// ```
///
/// Exactly one manager should exist per connection. It is created and
/// owned explicitly (usually by the bridge) and lent by reference.
/// Dropping it cancels any retry and closes the connection.
///
/// `connect` and any retry it triggers spawn Tokio work, so the manager
/// must be used from within a Tokio runtime.
pub struct ConnectionManager<T: Transport> {
    shared: Arc<Shared<T>>,
}

struct Shared<T: Transport> {
    transport: T,
    endpoint: String,
    policy: ReconnectPolicy,
    codec: JsonCodec,
    status: Arc<dyn StatusSink>,
    state_tx: watch::Sender<ConnectionState>,
    inner: Mutex<Inner<T::Connection>>,
}

struct Inner<C> {
    state: ConnectionState,
    /// Failures since the last successful open (or since `connect()`).
    attempts: u32,
    /// Last id handed out; ids start at 1.
    last_id: u64,
    connection: Option<C>,
    retry: Option<JoinHandle<()>>,
    /// Bumped whenever a retry is scheduled, so a timer that already
    /// woke up can tell it has been superseded.
    retry_epoch: u64,
}

impl<C: Connection> Inner<C> {
    fn owns(&self, id: ConnectionId) -> bool {
        self.connection.as_ref().is_some_and(|c| c.id() == id)
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.retry.take() {
            timer.abort();
            tracing::debug!("pending reconnect cancelled");
        }
    }
}

impl<T: Transport> ConnectionManager<T> {
    /// Creates a manager in the `Disconnected` state. Nothing is opened
    /// until [`connect`](Self::connect) is called.
    pub fn new(
        transport: T,
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                transport,
                endpoint: endpoint.into(),
                policy,
                codec: JsonCodec,
                status,
                state_tx,
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    attempts: 0,
                    last_id: 0,
                    connection: None,
                    retry: None,
                    retry_epoch: 0,
                }),
            }),
        }
    }

    /// Starts a fresh connect cycle.
    ///
    /// Any existing connection is closed ("Reconnecting") and any pending
    /// retry cancelled first, so repeated calls never leave two live
    /// connections. The attempt counter starts again from zero.
    pub fn connect(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();

        if inner.connection.is_some() {
            tracing::info!(state = %inner.state, "restarting connection");
        }
        shared.teardown(&mut inner, "Reconnecting");
        inner.attempts = 0;
        shared.set_state(&mut inner, ConnectionState::Connecting);
        shared.status.update("Connecting to server");
        shared.open(&mut inner);
    }

    /// Closes the connection (if any), cancels any pending retry and moves
    /// to `Disconnected`. No automatic reconnection follows.
    pub fn disconnect(&self, reason: &str) {
        let shared = &self.shared;
        let mut inner = shared.lock();

        shared.teardown(&mut inner, reason);
        shared.set_state(&mut inner, ConnectionState::Disconnected);
        tracing::info!(%reason, "disconnected");
        shared.status.update(&format!("Disconnected: {reason}"));
    }

    /// Sends one barcode to the server.
    ///
    /// Fire-and-forget: the frame is queued on the connection without
    /// waiting for the network. When the manager is not `Connected` the
    /// scan is dropped (there is no outbound queue) and
    /// [`ConnectionError::NotConnected`] is returned. A write failure is
    /// handled like any other connection failure; the scan is not retried.
    ///
    /// # Errors
    /// - [`ConnectionError::NotConnected`]: not connected, scan dropped
    /// - [`ConnectionError::Encode`]: the scan could not be encoded
    pub fn send(&self, barcode: &str) -> Result<(), ConnectionError> {
        let shared = &self.shared;
        let mut inner = shared.lock();

        let Some(connection) = inner
            .connection
            .as_ref()
            .filter(|_| inner.state.is_connected())
        else {
            tracing::debug!(code = barcode, state = %inner.state, "scan dropped, not connected");
            shared.status.update("Not connected - scan not sent");
            return Err(ConnectionError::NotConnected);
        };

        let frame = match shared.codec.encode_barcode(barcode) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode scan");
                shared.status.update("Error sending barcode");
                return Err(e.into());
            }
        };

        match connection.send(&frame) {
            Ok(()) => {
                tracing::info!(id = %connection.id(), code = barcode, "scan sent");
                shared.status.update(&format!("Sent: {barcode}"));
            }
            Err(e) => {
                tracing::warn!(id = %connection.id(), error = %e, "scan write failed");
                inner.connection = None;
                shared.fail(&mut inner, ConnectionError::TransportWrite(e));
            }
        }
        Ok(())
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Returns a receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// Failures counted against the reconnect budget so far.
    pub fn attempts(&self) -> u32 {
        self.shared.lock().attempts
    }

    /// Whether a reconnect timer is currently scheduled.
    pub fn has_pending_retry(&self) -> bool {
        self.shared.lock().retry.is_some()
    }

    /// The endpoint every connection is opened against.
    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// The reconnect policy in effect.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.shared.policy
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        self.shared.teardown(&mut inner, "Connection manager dropped");
    }
}

impl<T: Transport> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T::Connection>> {
        // A panicking status sink must not wedge the connection forever.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, inner: &mut Inner<T::Connection>, state: ConnectionState) {
        if inner.state != state {
            tracing::debug!(from = %inner.state, to = %state, "connection state changed");
        }
        inner.state = state;
        self.state_tx.send_replace(state);
    }

    /// Opens a new connection with the next id. The caller has already
    /// released any previous one.
    fn open(self: &Arc<Self>, inner: &mut Inner<T::Connection>) {
        inner.last_id += 1;
        let id = ConnectionId::new(inner.last_id);
        let listener = Arc::new(Listener {
            id,
            shared: Arc::downgrade(self),
        });
        tracing::info!(%id, endpoint = %self.endpoint, attempts = inner.attempts, "opening connection");
        inner.connection = Some(self.transport.open(&self.endpoint, id, listener));
    }

    fn teardown(&self, inner: &mut Inner<T::Connection>, reason: &str) {
        inner.cancel_retry();
        if let Some(connection) = inner.connection.take() {
            tracing::debug!(id = %connection.id(), %reason, "closing connection");
            connection.close(NORMAL_CLOSURE, reason);
        }
    }

    /// Counts a failure and either schedules a retry or gives up. The
    /// failed connection has already been released.
    fn fail(self: &Arc<Self>, inner: &mut Inner<T::Connection>, cause: ConnectionError) {
        inner.attempts += 1;
        let attempts = inner.attempts;

        if self.policy.is_exhausted(attempts) {
            self.set_state(inner, ConnectionState::Failed);
            let gave_up = ConnectionError::RetriesExhausted(attempts);
            tracing::error!(error = %cause, attempts, "giving up on connection");
            self.status
                .update(&format!("Connection failed: {cause}; {gave_up}"));
            return;
        }

        self.set_state(inner, ConnectionState::Connecting);
        tracing::warn!(
            error = %cause,
            attempts,
            max_attempts = self.policy.max_attempts,
            delay = ?self.policy.delay,
            "connection failed, retry scheduled"
        );
        self.status.update(&format!(
            "Connection failed: {cause}; retrying in {:?} ({attempts} of {} attempts failed)",
            self.policy.delay, self.policy.max_attempts,
        ));
        self.schedule_retry(inner);
    }

    fn schedule_retry(self: &Arc<Self>, inner: &mut Inner<T::Connection>) {
        inner.cancel_retry();
        inner.retry_epoch += 1;
        let epoch = inner.retry_epoch;
        let delay = self.policy.delay;
        let shared = Arc::downgrade(self);

        inner.retry = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = shared.upgrade() {
                shared.fire_retry(epoch);
            }
        }));
    }

    fn fire_retry(self: &Arc<Self>, epoch: u64) {
        let mut inner = self.lock();
        if inner.retry_epoch != epoch || inner.retry.is_none() {
            return;
        }
        inner.retry = None;
        if inner.state != ConnectionState::Connecting || inner.connection.is_some() {
            return;
        }

        tracing::info!(attempts = inner.attempts, "retrying connection");
        self.status.update(&format!(
            "Reconnecting (attempt {} of {})",
            inner.attempts + 1,
            self.policy.max_attempts,
        ));
        self.open(&mut inner);
    }

    // -- Transport callbacks, routed through a per-connection Listener --

    fn handle_open(&self, id: ConnectionId) {
        let mut inner = self.lock();
        if !inner.owns(id) || inner.state != ConnectionState::Connecting {
            tracing::debug!(%id, "ignoring open from stale connection");
            return;
        }

        if self.policy.reset_on_connect {
            inner.attempts = 0;
        }
        self.set_state(&mut inner, ConnectionState::Connected);
        tracing::info!(%id, endpoint = %self.endpoint, "connected");
        self.status.update("Connected to server");
    }

    fn handle_message(&self, id: ConnectionId, data: Vec<u8>) {
        let inner = self.lock();
        if !inner.owns(id) {
            tracing::debug!(%id, "ignoring frame from stale connection");
            return;
        }

        match self.codec.decode(&data) {
            InboundMessage::Error { message } => {
                tracing::warn!(%id, %message, "server reported error");
                self.status.update(&format!("Server error: {message}"));
            }
            InboundMessage::Unknown { raw } => {
                tracing::trace!(%id, len = raw.len(), "ignoring unrecognised frame");
            }
        }
    }

    fn handle_failure(self: &Arc<Self>, id: ConnectionId, error: TransportError) {
        let mut inner = self.lock();
        if !inner.owns(id) {
            tracing::debug!(%id, error = %error, "ignoring failure from stale connection");
            return;
        }

        let cause = match (inner.state, error) {
            (ConnectionState::Connected, e @ TransportError::SendFailed(_)) => {
                ConnectionError::TransportWrite(e)
            }
            (ConnectionState::Connected, e) => ConnectionError::TransportLost(e),
            (_, e) => ConnectionError::TransportOpen(e),
        };
        inner.connection = None;
        self.fail(&mut inner, cause);
    }

    fn handle_closed(self: &Arc<Self>, id: ConnectionId, code: u16, reason: String) {
        let mut inner = self.lock();
        if !inner.owns(id) {
            tracing::debug!(%id, code, "ignoring close from stale connection");
            return;
        }
        inner.connection = None;

        if inner.state == ConnectionState::Connected {
            self.set_state(&mut inner, ConnectionState::Disconnected);
            tracing::info!(%id, code, %reason, "connection closed by server");
            let shown = if reason.is_empty() {
                format!("connection closed by server (code {code})")
            } else {
                reason
            };
            self.status.update(&format!("Disconnected: {shown}"));
        } else {
            // Closed before the handshake finished: count it as a failed open.
            self.fail(&mut inner, ConnectionError::ClosedByPeer { code, reason });
        }
    }
}

/// Routes one connection's callbacks back to the manager, tagged with
/// the id that connection was opened with.
struct Listener<T: Transport> {
    id: ConnectionId,
    shared: Weak<Shared<T>>,
}

impl<T: Transport> TransportEvents for Listener<T> {
    fn on_open(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_open(self.id);
        }
    }

    fn on_message(&self, data: Vec<u8>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_message(self.id, data);
        }
    }

    fn on_failure(&self, error: TransportError) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_failure(self.id, error);
        }
    }

    fn on_closed(&self, code: u16, reason: String) {
        if let Some(shared) = self.shared.upgrade() {
            shared.handle_closed(self.id, code, reason);
        }
    }
}
