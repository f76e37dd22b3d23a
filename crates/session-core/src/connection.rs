//! Connection state owned by the connection manager.
//!
//! One `Connection` wraps one transport plus the bookkeeping the session
//! needs around it: status, reconnect-attempt counter and whether the
//! session currently wants the transport active. State transitions live
//! here; event dispatch to listeners and handlers happens in `session`.

use tracing::{debug, info, warn};

use crate::config::ConnectionOptions;
use crate::error::SessionError;
use crate::status::ConnectionStatus;
use crate::transport::{ConnectionId, Transport};

/// Read-only view of a connection handed out by `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub endpoint: String,
    pub status: ConnectionStatus,
    pub reconnect_attempts: u32,
}

pub struct Connection {
    id: ConnectionId,
    options: ConnectionOptions,
    status: ConnectionStatus,
    reconnect_attempts: u32,
    /// Whether the transport has been activated and not since deactivated.
    active: bool,
    transport: Box<dyn Transport>,
}

impl Connection {
    pub fn new(id: ConnectionId, options: ConnectionOptions, transport: Box<dyn Transport>) -> Self {
        Connection {
            id,
            options,
            status: ConnectionStatus::Disconnected,
            reconnect_attempts: 0,
            active: false,
            transport,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            endpoint: self.options.endpoint.clone(),
            status: self.status,
            reconnect_attempts: self.reconnect_attempts,
        }
    }

    /// `connect()`: start activation unless already connected or on the way.
    ///
    /// Returns whether activation was started.
    pub fn start(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Connected | ConnectionStatus::Connecting => {
                debug!(status = %self.status, "connect ignored");
                false
            }
            ConnectionStatus::Error | ConnectionStatus::Disconnected => {
                if self.status == ConnectionStatus::Error {
                    // A manual retry after giving up gets a fresh budget.
                    self.reconnect_attempts = 0;
                }
                info!(endpoint = %self.options.endpoint, "connecting");
                self.status = ConnectionStatus::Connecting;
                self.active = true;
                self.transport.activate();
                true
            }
        }
    }

    /// `disconnect()`: tear down unless already at rest with nothing running.
    ///
    /// Returns whether anything was torn down.
    pub fn stop(&mut self) -> bool {
        if self.status.is_at_rest() && !self.active {
            debug!("disconnect ignored: not connected");
            return false;
        }
        self.force_stop(ConnectionStatus::Disconnected);
        true
    }

    /// Unconditional teardown, settling in `status`.
    pub fn force_stop(&mut self, status: ConnectionStatus) {
        info!(endpoint = %self.options.endpoint, %status, "disconnecting");
        self.transport.deactivate();
        self.active = false;
        self.status = status;
    }

    /// Handshake accepted.
    pub fn on_connected(&mut self) {
        info!(endpoint = %self.options.endpoint, "connected");
        self.reconnect_attempts = 0;
        self.status = ConnectionStatus::Connected;
    }

    /// An established connection closed.
    ///
    /// Returns `false` when the close is left over from an earlier cycle:
    /// transports only report `Closed` for an established session, so one
    /// arriving while a new attempt is `Connecting` changes nothing.
    pub fn on_closed(&mut self) -> bool {
        match self.status {
            ConnectionStatus::Connecting => {
                debug!("close from a previous session while connecting; ignored");
                false
            }
            ConnectionStatus::Error => true,
            ConnectionStatus::Connected | ConnectionStatus::Disconnected => {
                self.status = ConnectionStatus::Disconnected;
                true
            }
        }
    }

    /// Broker rejected us: always fatal to this connection.
    pub fn on_broker_error(&mut self, message: String, details: Option<String>) -> SessionError {
        warn!(%message, "broker error");
        self.force_stop(ConnectionStatus::Disconnected);
        SessionError::Broker { message, details }
    }

    /// Socket-level failure: count it, give up once the budget is spent.
    pub fn on_socket_error(&mut self, reason: String) -> SessionError {
        self.reconnect_attempts += 1;
        let attempts = self.reconnect_attempts;

        if self.options.retries_exhausted(attempts) {
            warn!(attempts, %reason, "max reconnect attempts reached");
            self.force_stop(ConnectionStatus::Error);
            SessionError::RetriesExhausted { reason, attempts }
        } else {
            warn!(attempt = attempts, %reason, "transport error");
            SessionError::Transport {
                reason,
                attempt: attempts,
            }
        }
    }
}
