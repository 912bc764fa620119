//! Bridge configuration, selected by environment at process start.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{ReconnectPolicy, ScanlinkError};

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Which server the scanner talks to by default.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// A bridge server on the local machine.
    #[default]
    Debug,
    /// The deployed bridge server (over TLS).
    Production,
}

impl Environment {
    /// Endpoint used when `SCANLINK_URL` is not set.
    pub fn default_url(self) -> &'static str {
        match self {
            Self::Debug => "ws://127.0.0.1:8080/?type=scanner",
            Self::Production => "wss://scanner.example.com/ws?type=scanner",
        }
    }
}

impl FromStr for Environment {
    type Err = ScanlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "dev" | "development" => Ok(Self::Debug),
            "production" | "prod" | "release" => Ok(Self::Production),
            other => Err(ScanlinkError::Config(format!(
                "unknown environment {other:?} (expected debug or production)"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Production => "production",
        })
    }
}

// ---------------------------------------------------------------------------
// BridgeConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`ScannerBridge`](crate::ScannerBridge).
///
/// Build one with [`from_env`](Self::from_env) in binaries, or start from
/// [`for_environment`](Self::for_environment) / `Default` and override
/// fields in code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// The environment the endpoint was chosen for.
    pub environment: Environment,

    /// Server URL, without the client id.
    pub endpoint_url: String,

    /// Fixed delay between reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Failures tolerated before the connection is marked failed.
    pub max_reconnect_attempts: u32,

    /// Identifies this scanner to the server (`clientId` query parameter).
    /// Random per process by default; empty to omit the parameter.
    pub client_id: String,

    /// How many scans may wait between the scan source and the connection.
    pub scan_buffer: usize,
}

impl BridgeConfig {
    /// Environment variable selecting [`Environment`].
    pub const ENV_ENVIRONMENT: &'static str = "SCANLINK_ENV";
    /// Environment variable overriding the endpoint URL.
    pub const ENV_URL: &'static str = "SCANLINK_URL";
    /// Environment variable for the reconnect delay in milliseconds.
    pub const ENV_RECONNECT_DELAY_MS: &'static str = "SCANLINK_RECONNECT_DELAY_MS";
    /// Environment variable for the maximum reconnect attempts.
    pub const ENV_MAX_RECONNECT_ATTEMPTS: &'static str = "SCANLINK_MAX_RECONNECT_ATTEMPTS";

    /// Defaults for the given environment.
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            endpoint_url: environment.default_url().to_string(),
            reconnect_delay_ms: u64::try_from(ReconnectPolicy::DEFAULT_DELAY.as_millis())
                .unwrap_or(u64::MAX),
            max_reconnect_attempts: ReconnectPolicy::DEFAULT_MAX_ATTEMPTS,
            client_id: generate_client_id(),
            scan_buffer: 64,
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`ScanlinkError::Config`] when a variable is set but cannot
    /// be parsed, or when the endpoint is `wss://` in a build without TLS.
    pub fn from_env() -> Result<Self, ScanlinkError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables supplied by
    /// `lookup` instead of the process environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ScanlinkError> {
        let environment = parse(&lookup, Self::ENV_ENVIRONMENT)?.unwrap_or_default();
        let mut config = Self::for_environment(environment);

        if let Some(url) = lookup(Self::ENV_URL).filter(|url| !url.trim().is_empty()) {
            config.endpoint_url = url.trim().to_string();
        }
        if let Some(delay) = parse(&lookup, Self::ENV_RECONNECT_DELAY_MS)? {
            config.reconnect_delay_ms = delay;
        }
        if let Some(max) = parse(&lookup, Self::ENV_MAX_RECONNECT_ATTEMPTS)? {
            config.max_reconnect_attempts = max;
        }

        let config = config.validated();
        config.check_endpoint()?;
        Ok(config)
    }

    /// Rejects an endpoint this build cannot reach.
    ///
    /// # Errors
    /// Returns [`ScanlinkError::Config`] for a `wss://` URL when the `tls`
    /// feature is not compiled in.
    pub fn check_endpoint(&self) -> Result<(), ScanlinkError> {
        let secure = self
            .endpoint_url
            .get(..6)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("wss://"));
        if secure && !scanlink_transport::TLS_ENABLED {
            return Err(ScanlinkError::Config(format!(
                "{} needs TLS; rebuild with the `tls` feature or use a ws:// URL",
                self.endpoint_url
            )));
        }
        Ok(())
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// - `max_reconnect_attempts` at least 1
    /// - `reconnect_delay_ms` at least 1
    /// - `scan_buffer` at least 1
    pub fn validated(mut self) -> Self {
        if self.max_reconnect_attempts == 0 {
            tracing::warn!("max_reconnect_attempts is 0, using 1");
            self.max_reconnect_attempts = 1;
        }
        if self.reconnect_delay_ms == 0 {
            tracing::warn!("reconnect_delay_ms is 0, using 1");
            self.reconnect_delay_ms = 1;
        }
        if self.scan_buffer == 0 {
            tracing::warn!("scan_buffer is 0, using 1");
            self.scan_buffer = 1;
        }
        self
    }

    /// The reconnect policy these settings describe.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_delay_ms),
            self.max_reconnect_attempts,
        )
    }

    /// The full endpoint: `endpoint_url` plus the `clientId` parameter.
    pub fn endpoint(&self) -> String {
        if self.client_id.is_empty() {
            return self.endpoint_url.clone();
        }
        let separator = if self.endpoint_url.contains('?') { '&' } else { '?' };
        format!("{}{separator}clientId={}", self.endpoint_url, self.client_id)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ScanlinkError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| ScanlinkError::Config(format!("{key}={raw:?}: {e}")))
}

/// Generates a random 32-character hex client id (128 bits).
fn generate_client_id() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
