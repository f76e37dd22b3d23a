//! Low-level wire types and constants.
//!
//! This module defines:
//! - The STOMP command table.
//! - Well-known header names.
//! - Heart-beat header parsing and negotiation.
//!
//! The actual encode/decode logic lives in `frame_codec`.

use std::fmt;
use std::time::Duration;

use crate::frame_codec::ProtocolError;

/// Protocol version we ask for in CONNECT.
pub const ACCEPT_VERSION: &str = "1.2";

pub mod header {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const HOST: &str = "host";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const VERSION: &str = "version";
    pub const DESTINATION: &str = "destination";
    pub const ID: &str = "id";
    pub const ACK: &str = "ack";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const MESSAGE_ID: &str = "message-id";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const MESSAGE: &str = "message";
}

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    // client → server
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,

    // server → client
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let cmd = match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "CONNECTED" => Command::Connected,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            _ => return None,
        };
        Some(cmd)
    }

    /// CONNECT and CONNECTED headers are never escaped (STOMP 1.2 §Value Encoding).
    pub fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One side's `heart-beat` header: `outgoing,incoming` in milliseconds.
///
/// `0` means "cannot send" / "does not want to receive".
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}

/// Agreed heart-beat intervals; `None` when disabled in that direction.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Negotiated {
    pub send_every: Option<Duration>,
    pub expect_every: Option<Duration>,
}

impl HeartBeat {
    pub fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        HeartBeat {
            outgoing_ms,
            incoming_ms,
        }
    }

    pub fn from_durations(outgoing: Duration, incoming: Duration) -> Self {
        HeartBeat::new(outgoing.as_millis() as u64, incoming.as_millis() as u64)
    }

    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let bad = || ProtocolError::InvalidHeartBeat(value.to_string());
        let (out, inc) = value.split_once(',').ok_or_else(bad)?;
        let outgoing_ms = out.trim().parse().map_err(|_| bad())?;
        let incoming_ms = inc.trim().parse().map_err(|_| bad())?;
        Ok(HeartBeat::new(outgoing_ms, incoming_ms))
    }

    pub fn to_header(self) -> String {
        format!("{},{}", self.outgoing_ms, self.incoming_ms)
    }

    /// Intervals for the client, given what it asked for and what the
    /// server answered in CONNECTED.
    pub fn negotiate(client: HeartBeat, server: HeartBeat) -> Negotiated {
        let pick = |ours: u64, theirs: u64| {
            if ours == 0 || theirs == 0 {
                None
            } else {
                Some(Duration::from_millis(ours.max(theirs)))
            }
        };
        Negotiated {
            send_every: pick(client.outgoing_ms, server.incoming_ms),
            expect_every: pick(client.incoming_ms, server.outgoing_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_survives_its_own_name() {
        for cmd in [
            Command::Connect,
            Command::Send,
            Command::Subscribe,
            Command::Unsubscribe,
            Command::Disconnect,
            Command::Connected,
            Command::Message,
            Command::Receipt,
            Command::Error,
        ] {
            assert_eq!(Command::parse(cmd.as_str()), Some(cmd));
        }
        assert_eq!(Command::parse("send"), None);
    }

    #[test]
    fn heart_beat_negotiation_takes_the_slower_side() {
        let client = HeartBeat::new(10_000, 10_000);
        let n = HeartBeat::negotiate(client, HeartBeat::new(0, 20_000));
        assert_eq!(n.send_every, Some(Duration::from_millis(20_000)));
        assert_eq!(n.expect_every, None);

        let n = HeartBeat::negotiate(HeartBeat::new(0, 5_000), HeartBeat::new(4_000, 4_000));
        assert_eq!(n.send_every, None);
        assert_eq!(n.expect_every, Some(Duration::from_millis(5_000)));
    }

    #[test]
    fn heart_beat_header_parses_and_rejects_garbage() {
        assert_eq!(HeartBeat::parse("0, 10000").unwrap(), HeartBeat::new(0, 10_000));
        assert!(HeartBeat::parse("10000").is_err());
        assert!(HeartBeat::parse("a,b").is_err());
        assert_eq!(HeartBeat::new(1, 2).to_header(), "1,2");
    }
}
