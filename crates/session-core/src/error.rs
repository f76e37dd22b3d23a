//! Errors delivered to `on_error` listeners.
//!
//! Connection-level failures never come back as `Err` from a `Session`
//! method; they are reported here, through the listener list, so callers
//! decide how to present them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Network-level failure establishing or keeping the socket.
    #[error("transport error (attempt {attempt}): {reason}")]
    Transport { reason: String, attempt: u32 },

    /// Retry budget used up; automatic reconnects have stopped.
    #[error("gave up after {attempts} failed connection attempts: {reason}")]
    RetriesExhausted { reason: String, attempts: u32 },

    /// Broker rejected a frame or the handshake; the connection is torn down.
    #[error("broker error: {message}")]
    Broker {
        message: String,
        details: Option<String>,
    },
}

impl SessionError {
    /// Text suitable for a status line.
    pub fn message(&self) -> &str {
        match self {
            SessionError::Transport { reason, .. } => reason,
            SessionError::RetriesExhausted { reason, .. } => reason,
            SessionError::Broker { message, .. } => message,
        }
    }

    /// Whether the session stopped retrying because of this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SessionError::Transport { .. })
    }
}
