//! Unified error type for Scanlink.

use scanlink_connection::ConnectionError;
use scanlink_protocol::ProtocolError;
use scanlink_transport::TransportError;

use crate::ScanError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ScanlinkError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A connection-level error (not connected, retries exhausted).
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The scan source could not be started.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A configuration value is missing or malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let scanlink_err: ScanlinkError = err.into();
        assert!(matches!(scanlink_err, ScanlinkError::Transport(_)));
        assert!(scanlink_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_connection_error() {
        let scanlink_err: ScanlinkError = ConnectionError::NotConnected.into();
        assert!(matches!(scanlink_err, ScanlinkError::Connection(_)));
        assert_eq!(scanlink_err.to_string(), "not connected");
    }

    #[test]
    fn test_from_scan_error() {
        let scanlink_err: ScanlinkError = ScanError::AlreadyRunning.into();
        assert!(matches!(scanlink_err, ScanlinkError::Scan(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err = ScanlinkError::Config("SCANLINK_ENV: unknown".into());
        assert_eq!(err.to_string(), "invalid configuration: SCANLINK_ENV: unknown");
    }
}
