//! Connection status for a session.

use std::fmt;

/// Where a connection currently sits in its lifecycle.
///
/// ```text
/// disconnected --connect--> connecting --handshake--> connected
/// connected --teardown | broker error | retries exhausted--> disconnected
/// connecting --transport error, retries exhausted--> error
/// ```
///
/// `Disconnected` and `Error` are both rest states; `Error` is left only
/// through an explicit `connect()`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// True for the two states a connection settles in without activity.
    pub fn is_at_rest(self) -> bool {
        matches!(self, ConnectionStatus::Disconnected | ConnectionStatus::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
