//! Publish gateway.
//!
//! Sends outbound intents only while connected. Anything else fails
//! immediately with `false`: no queueing, no retry, no receipt.

use tracing::{trace, warn};

use crate::connection::Connection;
use crate::messages::OutboundMessage;

/// Write `message` if `connection` is up. Returns whether it was written.
pub fn publish(connection: Option<&mut Connection>, message: &OutboundMessage) -> bool {
    let Some(conn) = connection else {
        warn!(destination = %message.destination, "cannot publish: not initialized");
        return false;
    };

    if !conn.status().is_connected() {
        warn!(
            destination = %message.destination,
            status = %conn.status(),
            "cannot publish: not connected"
        );
        return false;
    }

    trace!(destination = %message.destination, "publish");
    conn.transport_mut().send(message);
    true
}
