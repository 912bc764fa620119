//! Connection state and reconnect policy.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// The lifecycle state of the scanner's connection.
///
/// ```text
///                 connect()                 open
///  Disconnected ────────────→ Connecting ──────────→ Connected
///       ↑                      │   ↑  ↑                │  │
///       │          failure and │   │  └─── failure ────┘  │
///       │       attempts left  └───┘                      │
///       │                      │                          │
///       │   failure, attempts  ▼                          │
///       │        exhausted   Failed                       │
///       │                                                 │
///       └──────── disconnect() / closed by server ────────┘
/// ```
///
/// Retries only happen inside `Connecting`. `Disconnected` and `Failed`
/// stay put until someone calls `connect()` again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection and none being attempted.
    #[default]
    Disconnected,
    /// A connection is being opened, or a retry is scheduled.
    Connecting,
    /// The owned connection is open and can carry scans.
    Connected,
    /// Reconnect attempts are exhausted.
    Failed,
}

impl ConnectionState {
    /// Whether scans can be sent right now.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ReconnectPolicy
// ---------------------------------------------------------------------------

/// How the manager retries a connection that failed.
///
/// The delay is fixed, not exponential. Every failure (during the
/// handshake or on an open connection) counts as one attempt; when the
/// count reaches `max_attempts` the state becomes
/// [`Failed`](ConnectionState::Failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Time between a failure and the next attempt.
    pub delay: Duration,
    /// Failures tolerated before giving up. Values below 1 act as 1.
    pub max_attempts: u32,
    /// Whether a successful open resets the failure count to zero.
    pub reset_on_connect: bool,
}

impl ReconnectPolicy {
    /// Default delay between attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(5_000);
    /// Default number of attempts before giving up.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Creates a policy that resets its count on every successful open.
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            reset_on_connect: true,
        }
    }

    /// Whether `attempts` failures use up the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts.max(1)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DELAY, Self::DEFAULT_MAX_ATTEMPTS)
    }
}
