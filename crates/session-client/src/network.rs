// crates/session-client/src/network.rs

//! STOMP over WebSocket transport.
//!
//! [`WsConnector`] builds one [`WsTransport`] per connection object. A
//! transport is a thin command handle: every call is forwarded over an
//! unbounded channel to a spawned worker task that owns the socket. The
//! worker reports back through the connector's event channel, tagging
//! each event with its `ConnectionId`; the application loop feeds those
//! into `Session::handle_event`.
//!
//! Worker lifecycle:
//!
//! ```text
//! idle --activate--> connecting --CONNECTED--> established
//!   ^                    |  ^                        |
//!   |                    v  |                        v
//!   +--deactivate---- waiting (reconnect_delay) <-- lost
//! ```
//!
//! Dropping the transport closes its command channel and the worker
//! exits after closing the socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use session_core::{
    ConnectionId, ConnectionOptions, Connector, Headers, OutboundMessage, Transport, TransportEvent,
};
use stomp_protocol::{
    broker_error, connect_frame, decode_all, decode_leading, disconnect_frame, inbound_from_frame,
    send_frame, subscribe_frame, unsubscribe_frame, Command, Decoded, Frame, HeartBeat, ACCEPT_VERSION,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Events from every transport this connector built.
pub type EventReceiver = UnboundedReceiver<(ConnectionId, TransportEvent)>;
type EventSender = UnboundedSender<(ConnectionId, TransportEvent)>;

/// Receipt id attached to the DISCONNECT frame.
const DISCONNECT_RECEIPT: &str = "disconnect";

#[derive(Debug)]
enum WsCommand {
    Activate,
    Deactivate,
    Subscribe {
        id: String,
        destination: String,
        headers: Headers,
    },
    Unsubscribe(String),
    Send(OutboundMessage),
}

/// Builds WebSocket transports. Must be used from inside a tokio runtime.
#[derive(Clone)]
pub struct WsConnector {
    events: EventSender,
}

impl WsConnector {
    pub fn new() -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        (WsConnector { events }, rx)
    }
}

impl Connector for WsConnector {
    fn open(&self, id: ConnectionId, options: &ConnectionOptions) -> Box<dyn Transport> {
        let (commands, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            id,
            options: options.clone(),
            commands: rx,
            events: self.events.clone(),
        };
        tokio::spawn(worker.run());
        debug!(connection = id.0, endpoint = %options.endpoint, "spawned transport worker");
        Box::new(WsTransport { id, commands })
    }
}

pub struct WsTransport {
    id: ConnectionId,
    commands: UnboundedSender<WsCommand>,
}

impl WsTransport {
    fn command(&self, cmd: WsCommand) {
        if self.commands.send(cmd).is_err() {
            warn!(connection = self.id.0, "transport worker is gone; command dropped");
        }
    }
}

impl Transport for WsTransport {
    fn activate(&mut self) {
        self.command(WsCommand::Activate);
    }

    fn deactivate(&mut self) {
        self.command(WsCommand::Deactivate);
    }

    fn subscribe(&mut self, id: &str, destination: &str, headers: &Headers) {
        self.command(WsCommand::Subscribe {
            id: id.to_string(),
            destination: destination.to_string(),
            headers: headers.clone(),
        });
    }

    fn unsubscribe(&mut self, id: &str) {
        self.command(WsCommand::Unsubscribe(id.to_string()));
    }

    fn send(&mut self, message: &OutboundMessage) {
        self.command(WsCommand::Send(message.clone()));
    }
}

/// How one connection attempt ended.
enum Outcome {
    /// Asked to stop; go back to idle.
    Deactivated,
    /// Connection failed or went away; retry after the delay.
    Lost,
    /// Command channel closed; the transport was dropped.
    Dropped,
}

struct Worker {
    id: ConnectionId,
    options: ConnectionOptions,
    commands: UnboundedReceiver<WsCommand>,
    events: EventSender,
}

impl Worker {
    async fn run(mut self) {
        'idle: loop {
            if !self.wait_for_activate().await {
                break;
            }
            loop {
                match self.connect_once().await {
                    Outcome::Deactivated => continue 'idle,
                    Outcome::Dropped => break 'idle,
                    Outcome::Lost => {}
                }
                match self.wait_retry().await {
                    Outcome::Lost => continue,
                    Outcome::Deactivated => continue 'idle,
                    Outcome::Dropped => break 'idle,
                }
            }
        }
        debug!(connection = self.id.0, "transport worker finished");
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver only goes away when the application is shutting down.
        let _ = self.events.send((self.id, event));
    }

    /// Park until `activate`. Returns `false` once the transport is dropped.
    async fn wait_for_activate(&mut self) -> bool {
        loop {
            match self.commands.recv().await {
                Some(WsCommand::Activate) => return true,
                Some(WsCommand::Deactivate) => {}
                Some(other) => debug!(?other, "not active; command discarded"),
                None => return false,
            }
        }
    }

    /// Sleep for the reconnect delay, still honouring `deactivate`.
    ///
    /// `Outcome::Lost` here means "the delay elapsed, try again".
    async fn wait_retry(&mut self) -> Outcome {
        let delay = self.options.reconnect_delay;
        debug!(connection = self.id.0, ?delay, "reconnecting after delay");
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return Outcome::Lost,
                cmd = self.commands.recv() => match cmd {
                    Some(WsCommand::Deactivate) => return Outcome::Deactivated,
                    Some(WsCommand::Activate) => {}
                    Some(other) => debug!(?other, "not connected; command discarded"),
                    None => return Outcome::Dropped,
                },
            }
        }
    }

    async fn connect_once(&mut self) -> Outcome {
        let endpoint = self.options.endpoint.clone();
        info!(connection = self.id.0, %endpoint, "opening websocket");

        let connecting = connect_async(endpoint.as_str());
        tokio::pin!(connecting);
        let result = loop {
            tokio::select! {
                res = &mut connecting => break res,
                cmd = self.commands.recv() => match cmd {
                    Some(WsCommand::Deactivate) => return Outcome::Deactivated,
                    Some(WsCommand::Activate) => {}
                    Some(other) => debug!(?other, "not connected; command discarded"),
                    None => return Outcome::Dropped,
                },
            }
        };

        let mut ws = match result {
            Ok((ws, _response)) => ws,
            Err(e) => {
                warn!(connection = self.id.0, error = %e, "websocket connect failed");
                self.emit(TransportEvent::SocketError { reason: e.to_string() });
                return Outcome::Lost;
            }
        };

        let client_beat = HeartBeat::from_durations(self.options.heartbeat_outgoing, self.options.heartbeat_incoming);
        let connect = connect_frame(&host_of(&endpoint), ACCEPT_VERSION, client_beat, &self.options.connect_headers);
        if let Err(e) = write_frame(&mut ws, &connect).await {
            self.emit(TransportEvent::SocketError { reason: e.to_string() });
            return Outcome::Lost;
        }

        let connected = match self.await_handshake(&mut ws).await {
            Handshake::Accepted(frame) => frame,
            Handshake::Ended(outcome) => return outcome,
        };

        // Anything queued so far was meant for an earlier connection; the
        // session re-subscribes after it sees `Connected`.
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                WsCommand::Deactivate => {
                    close_gracefully(&mut ws).await;
                    return Outcome::Deactivated;
                }
                other => trace!(?other, "stale command discarded"),
            }
        }

        let server_beat = connected
            .get("heart-beat")
            .and_then(|v| HeartBeat::parse(v).ok())
            .unwrap_or_default();
        let beats = HeartBeat::negotiate(client_beat, server_beat);
        info!(
            connection = self.id.0,
            version = connected.get("version").unwrap_or("?"),
            send_every = ?beats.send_every,
            expect_every = ?beats.expect_every,
            "stomp session established"
        );
        self.emit(TransportEvent::Connected {
            headers: connected.headers,
        });

        self.established(ws, beats.send_every, beats.expect_every).await
    }

    async fn await_handshake(&mut self, ws: &mut WsStream) -> Handshake {
        loop {
            tokio::select! {
                msg = ws.next() => {
                    let text = match msg {
                        Some(Ok(WsMessage::Text(text))) => text.as_str().to_string(),
                        Some(Ok(WsMessage::Close(_))) | None => {
                            self.emit(TransportEvent::SocketError { reason: "closed during handshake".into() });
                            return Handshake::Ended(Outcome::Lost);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            self.emit(TransportEvent::SocketError { reason: e.to_string() });
                            return Handshake::Ended(Outcome::Lost);
                        }
                    };
                    let items = match decode_all(&text) {
                        Ok(items) => items,
                        Err(e) => {
                            warn!(error = %e, "undecodable handshake reply");
                            self.emit(TransportEvent::SocketError { reason: e.to_string() });
                            close_gracefully(ws).await;
                            return Handshake::Ended(Outcome::Lost);
                        }
                    };
                    for item in items {
                        let Decoded::Frame(frame) = item else { continue };
                        match frame.command {
                            Command::Connected => return Handshake::Accepted(frame),
                            Command::Error => {
                                let (message, details) = broker_error(&frame);
                                warn!(%message, "broker rejected CONNECT");
                                self.emit(TransportEvent::BrokerError { message, details });
                                close_gracefully(ws).await;
                                return Handshake::Ended(Outcome::Lost);
                            }
                            other => debug!(command = %other, "ignored before CONNECTED"),
                        }
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(WsCommand::Deactivate) => {
                        close_gracefully(ws).await;
                        return Handshake::Ended(Outcome::Deactivated);
                    }
                    Some(WsCommand::Activate) => {}
                    Some(other) => debug!(?other, "handshake pending; command discarded"),
                    None => {
                        close_gracefully(ws).await;
                        return Handshake::Ended(Outcome::Dropped);
                    }
                },
            }
        }
    }

    async fn established(
        &mut self,
        mut ws: WsStream,
        send_every: Option<Duration>,
        expect_every: Option<Duration>,
    ) -> Outcome {
        let mut outgoing = send_every.map(heartbeat_interval);
        // Silence for twice the agreed interval means the peer is gone.
        let mut watchdog = expect_every.map(heartbeat_interval);
        let allowed_silence = expect_every.map(|d| d * 2);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                cmd = self.commands.recv() => {
                    let frame = match cmd {
                        Some(WsCommand::Subscribe { id, destination, headers }) => {
                            debug!(%id, %destination, "SUBSCRIBE");
                            subscribe_frame(&id, &destination, &headers)
                        }
                        Some(WsCommand::Unsubscribe(id)) => {
                            debug!(%id, "UNSUBSCRIBE");
                            unsubscribe_frame(&id)
                        }
                        Some(WsCommand::Send(message)) => {
                            debug!(destination = %message.destination, "SEND");
                            send_frame(&message)
                        }
                        Some(WsCommand::Activate) => continue,
                        Some(WsCommand::Deactivate) => {
                            info!(connection = self.id.0, "disconnecting");
                            let _ = write_frame(&mut ws, &disconnect_frame(DISCONNECT_RECEIPT)).await;
                            close_gracefully(&mut ws).await;
                            self.emit(TransportEvent::Closed { reason: None });
                            return Outcome::Deactivated;
                        }
                        None => {
                            close_gracefully(&mut ws).await;
                            return Outcome::Dropped;
                        }
                    };
                    if let Err(e) = write_frame(&mut ws, &frame).await {
                        return self.lost(e.to_string());
                    }
                }

                msg = ws.next() => {
                    last_seen = Instant::now();
                    let text = match msg {
                        Some(Ok(WsMessage::Text(text))) => text.as_str().to_string(),
                        Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => text,
                            Err(_) => {
                                warn!("binary websocket message is not UTF-8; ignored");
                                continue;
                            }
                        },
                        Some(Ok(WsMessage::Close(close))) => {
                            let reason = close.map(|c| c.reason.as_str().to_string()).filter(|r| !r.is_empty());
                            info!(connection = self.id.0, ?reason, "server closed the connection");
                            self.emit(TransportEvent::Closed { reason });
                            return Outcome::Lost;
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return self.lost(e.to_string()),
                        None => {
                            self.emit(TransportEvent::Closed { reason: None });
                            return Outcome::Lost;
                        }
                    };
                    if let Some(outcome) = self.dispatch(&text, &mut ws).await {
                        return outcome;
                    }
                }

                _ = tick(&mut outgoing) => {
                    trace!("heart-beat out");
                    if let Err(e) = ws.send(WsMessage::Text("\n".into())).await {
                        return self.lost(e.to_string());
                    }
                }

                _ = tick(&mut watchdog) => {
                    if let Some(limit) = allowed_silence {
                        if last_seen.elapsed() > limit {
                            warn!(connection = self.id.0, ?limit, "no heart-beat from server");
                            close_gracefully(&mut ws).await;
                            return self.lost("heart-beat timeout".to_string());
                        }
                    }
                }
            }
        }
    }

    /// Handle one inbound text message. `Some` ends the connection.
    ///
    /// Frames ahead of an undecodable one are still delivered; the rest of
    /// the message is dropped.
    async fn dispatch(&mut self, text: &str, ws: &mut WsStream) -> Option<Outcome> {
        let (items, failure) = decode_leading(text);
        if let Some(e) = &failure {
            warn!(error = %e, decoded = items.len(), "undecodable frame; rest of message ignored");
        }
        for item in items {
            let frame = match item {
                Decoded::Heartbeat => {
                    trace!("heart-beat in");
                    continue;
                }
                Decoded::Frame(frame) => frame,
            };
            match frame.command {
                Command::Message => match inbound_from_frame(frame) {
                    Ok(inbound) => {
                        trace!(destination = %inbound.destination, "MESSAGE");
                        self.emit(TransportEvent::Message(inbound));
                    }
                    Err(e) => warn!(error = %e, "MESSAGE frame dropped"),
                },
                Command::Error => {
                    let (message, details) = broker_error(&frame);
                    warn!(%message, "broker error");
                    self.emit(TransportEvent::BrokerError { message, details });
                    close_gracefully(ws).await;
                    return Some(Outcome::Lost);
                }
                Command::Receipt => debug!(receipt = frame.get("receipt-id").unwrap_or("?"), "RECEIPT"),
                other => debug!(command = %other, "unexpected frame ignored"),
            }
        }
        None
    }

    /// Mid-session socket failure.
    fn lost(&self, reason: String) -> Outcome {
        warn!(connection = self.id.0, %reason, "connection lost");
        self.emit(TransportEvent::SocketError {
            reason: reason.clone(),
        });
        self.emit(TransportEvent::Closed {
            reason: Some(reason),
        });
        Outcome::Lost
    }
}

enum Handshake {
    Accepted(Frame),
    Ended(Outcome),
}

fn heartbeat_interval(every: Duration) -> Interval {
    let mut i = interval_at(Instant::now() + every, every);
    i.set_missed_tick_behavior(MissedTickBehavior::Delay);
    i
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => {
            i.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn write_frame(ws: &mut WsStream, frame: &Frame) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    ws.send(WsMessage::Text(frame.to_text().into())).await
}

async fn close_gracefully(ws: &mut WsStream) {
    if let Err(e) = ws.close(None).await {
        debug!(error = %e, "close handshake failed");
    }
}

/// Value for the CONNECT `host` header.
fn host_of(endpoint: &str) -> String {
    Url::parse(endpoint)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_comes_from_endpoint() {
        assert_eq!(host_of("ws://game.example:3001/ws"), "game.example");
        assert_eq!(host_of("not a url"), "localhost");
    }
}
