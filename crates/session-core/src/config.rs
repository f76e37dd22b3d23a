//! Connection options handed to a transport when a connection is built.
//!
//! These are fixed for the life of one connection object; `initialize`
//! builds a fresh copy (with the session identity folded into the
//! connect headers) every time it constructs a connection.

use std::time::Duration;

use crate::messages::Headers;

/// Default real-time endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:3001/ws";

/// Connect header carrying the session identity.
pub const IDENTITY_HEADER: &str = "login";

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    /// WebSocket URL of the broker endpoint.
    pub endpoint: String,

    /// Extra headers sent with the CONNECT frame.
    pub connect_headers: Headers,

    /// Fixed delay between automatic reconnect attempts.
    pub reconnect_delay: Duration,

    /// How often we expect to hear from the broker (`0` disables).
    pub heartbeat_incoming: Duration,

    /// How often we send a heart-beat to the broker (`0` disables).
    pub heartbeat_outgoing: Duration,

    /// Transport errors tolerated before automatic retries stop.
    /// `0` means retry forever.
    pub max_reconnect_attempts: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            connect_headers: Headers::new(),
            reconnect_delay: Duration::from_millis(3000),
            heartbeat_incoming: Duration::from_millis(10_000),
            heartbeat_outgoing: Duration::from_millis(10_000),
            max_reconnect_attempts: 5,
        }
    }
}

impl ConnectionOptions {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Copy of these options with `identity` set as the identity header.
    ///
    /// An identity that is blank after trimming is ignored.
    pub fn with_identity(&self, identity: Option<&str>) -> Self {
        let mut options = self.clone();
        if let Some(id) = identity.map(str::trim).filter(|id| !id.is_empty()) {
            options.connect_headers.insert(IDENTITY_HEADER, id);
        }
        options
    }

    /// Whether `attempts` transport errors exhaust the retry budget.
    pub fn retries_exhausted(&self, attempts: u32) -> bool {
        self.max_reconnect_attempts > 0 && attempts >= self.max_reconnect_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_lands_in_connect_headers() {
        let base = ConnectionOptions::default();
        let opts = base.with_identity(Some(" 12345678 "));
        assert_eq!(opts.connect_headers.get(IDENTITY_HEADER), Some("12345678"));
        assert!(base.connect_headers.is_empty());
    }

    #[test]
    fn blank_identity_is_ignored() {
        let opts = ConnectionOptions::default().with_identity(Some("   "));
        assert!(opts.connect_headers.get(IDENTITY_HEADER).is_none());
    }

    #[test]
    fn zero_max_attempts_never_exhausts() {
        let mut opts = ConnectionOptions::default();
        opts.max_reconnect_attempts = 0;
        assert!(!opts.retries_exhausted(u32::MAX));

        opts.max_reconnect_attempts = 5;
        assert!(!opts.retries_exhausted(4));
        assert!(opts.retries_exhausted(5));
    }
}
