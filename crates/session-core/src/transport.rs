//! The seam between session logic and the network.
//!
//! A [`Transport`] only accepts commands. Everything the network has to
//! say comes back later as a [`TransportEvent`] fed into
//! `Session::handle_event`, tagged with the [`ConnectionId`] of the
//! transport that produced it. A transport must never call back into the
//! session synchronously from one of its command methods.

use crate::config::ConnectionOptions;
use crate::messages::{Headers, InboundFrame, OutboundMessage};

/// Identifies one connection object built by `initialize`.
///
/// Unique over the lifetime of a session; events carrying an id other
/// than the current one are stale and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

pub trait Transport {
    /// Start connecting (and keep reconnecting after `reconnect_delay`)
    /// until `deactivate`.
    fn activate(&mut self);

    /// Stop retrying and gracefully close any established connection.
    fn deactivate(&mut self);

    /// Open a transport-level subscription.
    fn subscribe(&mut self, id: &str, destination: &str, headers: &Headers);

    /// Close a transport-level subscription.
    fn unsubscribe(&mut self, id: &str);

    /// Write one message. No receipt is requested.
    fn send(&mut self, message: &OutboundMessage);
}

/// Builds transports. `initialize` calls this once per connection object.
pub trait Connector {
    fn open(&self, id: ConnectionId, options: &ConnectionOptions) -> Box<dyn Transport>;
}

impl<F> Connector for F
where
    F: Fn(ConnectionId, &ConnectionOptions) -> Box<dyn Transport>,
{
    fn open(&self, id: ConnectionId, options: &ConnectionOptions) -> Box<dyn Transport> {
        self(id, options)
    }
}

/// Something that happened on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake accepted by the broker.
    Connected { headers: Headers },

    /// An established connection went away (graceful or broker-initiated).
    Closed { reason: Option<String> },

    /// Broker rejected a frame or the handshake.
    BrokerError {
        message: String,
        details: Option<String>,
    },

    /// Socket-level failure: could not connect, or lost the socket.
    SocketError { reason: String },

    /// A message for one of our subscriptions.
    Message(InboundFrame),
}
