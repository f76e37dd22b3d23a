// crates/session-client/tests/ws_transport.rs
//
// End-to-end runs of the WebSocket transport against an in-process STOMP
// stub broker.
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;
use session_client::{EventReceiver, WsConnector};
use session_core::{
    ConnectionOptions, ConnectionStatus, Payload, Session, SessionError,
};
use stomp_protocol::{decode_all, Command, Decoded, Frame};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Accept,
    /// Close the first connection right after answering its first SUBSCRIBE.
    DropFirstAfterSubscribe,
    Reject,
    /// Agree on 100ms heart-beats in both directions, then never send one.
    SilentHeartbeats,
    /// Follow each MESSAGE with an undecodable frame in the same text message.
    TrailingGarbage,
}

/// Frames the broker received, tagged with the connection number (1-based).
type Seen = mpsc::UnboundedReceiver<(usize, Frame)>;
/// Connection number of every heart-beat the broker received.
type Beats = mpsc::UnboundedReceiver<usize>;

#[derive(Clone)]
struct Taps {
    frames: mpsc::UnboundedSender<(usize, Frame)>,
    beats: mpsc::UnboundedSender<usize>,
}

async fn start_broker(mode: Mode) -> (String, Seen, Beats) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let (frames, seen) = mpsc::unbounded_channel();
    let (beats, beats_rx) = mpsc::unbounded_channel();
    let taps = Taps { frames, beats };
    tokio::spawn(async move {
        let mut conn = 0;
        while let Ok((stream, _)) = listener.accept().await {
            conn += 1;
            tokio::spawn(serve(stream, conn, mode, taps.clone()));
        }
    });
    (url, seen, beats_rx)
}

async fn serve(stream: TcpStream, conn: usize, mode: Mode, taps: Taps) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    while let Some(Ok(msg)) = ws.next().await {
        let WsMessage::Text(text) = msg else {
            continue;
        };
        for item in decode_all(text.as_str()).unwrap() {
            let frame = match item {
                Decoded::Frame(frame) => frame,
                Decoded::Heartbeat => {
                    let _ = taps.beats.send(conn);
                    continue;
                }
            };
            let _ = taps.frames.send((conn, frame.clone()));

            let reply = match frame.command {
                Command::Connect if mode == Mode::Reject => {
                    Some(Frame::new(Command::Error).header("message", "Bad credentials"))
                }
                Command::Connect => {
                    let beats = if mode == Mode::SilentHeartbeats { "100,100" } else { "0,0" };
                    Some(
                        Frame::new(Command::Connected)
                            .header("version", "1.2")
                            .header("heart-beat", beats),
                    )
                }
                Command::Subscribe => Some(
                    Frame::new(Command::Message)
                        .header("destination", frame.get("destination").unwrap_or_default())
                        .header("subscription", frame.get("id").unwrap_or_default())
                        .header("message-id", format!("m-{conn}"))
                        .with_body(format!("{{\"conn\":{conn}}}")),
                ),
                Command::Disconnect => Some(
                    Frame::new(Command::Receipt).header("receipt-id", frame.get("receipt").unwrap_or_default()),
                ),
                _ => None,
            };
            if let Some(reply) = reply {
                let mut text = reply.to_text();
                if mode == Mode::TrailingGarbage && reply.command == Command::Message {
                    text.push_str("HELLO\n\n\0");
                }
                let _ = ws.send(WsMessage::Text(text.into())).await;
            }

            let hang_up = (mode == Mode::Reject && frame.command == Command::Connect)
                || (mode == Mode::DropFirstAfterSubscribe && conn == 1 && frame.command == Command::Subscribe);
            if hang_up {
                let _ = ws.close(None).await;
                return;
            }
        }
    }
}

fn options(url: &str, max_attempts: u32) -> ConnectionOptions {
    let mut opts = ConnectionOptions::new(url);
    opts.reconnect_delay = Duration::from_millis(50);
    opts.max_reconnect_attempts = max_attempts;
    opts
}

/// Feed transport events into the session until `done` holds.
async fn pump_until(session: &Session, events: &mut EventReceiver, mut done: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !done() {
            let (id, event) = events.recv().await.expect("event channel open");
            session.handle_event(id, event);
        }
    })
    .await
    .expect("timed out waiting for the session");
}

async fn next_frames(seen: &mut Seen, n: usize) -> Vec<(usize, Frame)> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        let item = timeout(WAIT, seen.recv())
            .await
            .expect("timed out waiting for the broker")
            .expect("broker running");
        out.push(item);
    }
    out
}

fn recorder() -> (Rc<RefCell<Vec<Payload>>>, impl FnMut(&session_core::Message) + 'static) {
    let got = Rc::new(RefCell::new(Vec::new()));
    let g = got.clone();
    (got, move |m: &session_core::Message| g.borrow_mut().push(m.payload.clone()))
}

#[tokio::test]
async fn subscribe_publish_and_disconnect_against_broker() {
    let (url, mut seen, _beats) = start_broker(Mode::Accept).await;
    let (connector, mut events) = WsConnector::new();
    let session = Session::new(options(&url, 5), connector);
    session.initialize(Some("12345678"));

    let (got, record) = recorder();
    let _sub = session.subscribe("/user/queue/game", record);
    session.connect();

    pump_until(&session, &mut events, || !got.borrow().is_empty()).await;
    assert!(session.is_connected());
    assert_eq!(*got.borrow(), vec![Payload::Json(json!({ "conn": 1 }))]);

    assert!(session.publish("/app/game/start", json!({})));

    let frames = next_frames(&mut seen, 3).await;
    let (_, connect) = &frames[0];
    assert_eq!(connect.command, Command::Connect);
    assert_eq!(connect.get("login"), Some("12345678"));
    assert_eq!(connect.get("accept-version"), Some("1.2"));
    assert_eq!(connect.get("host"), Some("127.0.0.1"));

    let (_, subscribe) = &frames[1];
    assert_eq!(subscribe.command, Command::Subscribe);
    assert_eq!(subscribe.get("destination"), Some("/user/queue/game"));

    let (_, send) = &frames[2];
    assert_eq!(send.command, Command::Send);
    assert_eq!(send.get("destination"), Some("/app/game/start"));
    assert_eq!(send.get("content-type"), Some("application/json"));
    assert_eq!(send.body, "{}");

    session.disconnect();
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    let frames = next_frames(&mut seen, 1).await;
    assert_eq!(frames[0].1.command, Command::Disconnect);
}

#[tokio::test]
async fn subscriptions_come_back_after_the_broker_drops_us() {
    let (url, mut seen, _beats) = start_broker(Mode::DropFirstAfterSubscribe).await;
    let (connector, mut events) = WsConnector::new();
    let session = Session::new(options(&url, 5), connector);
    session.initialize(None);

    let (got, record) = recorder();
    let _sub = session.subscribe("/user/queue/game", record);
    session.connect();

    pump_until(&session, &mut events, || got.borrow().len() >= 2).await;
    assert_eq!(
        *got.borrow(),
        vec![
            Payload::Json(json!({ "conn": 1 })),
            Payload::Json(json!({ "conn": 2 })),
        ]
    );
    assert!(session.is_connected());
    assert_eq!(session.reconnect_attempts(), 0);
    assert_eq!(session.subscription_count(), 1);
    assert_eq!(session.live_subscription_count(), 1);

    let subscribes: Vec<usize> = next_frames(&mut seen, 4)
        .await
        .into_iter()
        .filter(|(_, f)| f.command == Command::Subscribe)
        .map(|(conn, _)| conn)
        .collect();
    assert_eq!(subscribes, vec![1, 2]);
}

#[tokio::test]
async fn rejected_handshake_is_reported_as_broker_error() {
    let (url, _seen, _beats) = start_broker(Mode::Reject).await;
    let (connector, mut events) = WsConnector::new();
    let session = Session::new(options(&url, 5), connector);
    session.initialize(Some("bad"));

    let errors: Rc<RefCell<Vec<SessionError>>> = Rc::default();
    let e = errors.clone();
    let _h = session.on_error(move |err| e.borrow_mut().push(err.clone()));
    session.connect();

    pump_until(&session, &mut events, || !errors.borrow().is_empty()).await;
    assert_eq!(
        errors.borrow()[0],
        SessionError::Broker {
            message: "Bad credentials".into(),
            details: None
        }
    );
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
    assert!(!session.publish("/app/game/start", json!({})));
}

#[tokio::test]
async fn unreachable_broker_gives_up_after_max_attempts() {
    let url = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("ws://{}/ws", listener.local_addr().unwrap())
    };
    let (connector, mut events) = WsConnector::new();
    let session = Session::new(options(&url, 2), connector);
    session.initialize(None);

    let errors: Rc<RefCell<Vec<SessionError>>> = Rc::default();
    let e = errors.clone();
    let _h = session.on_error(move |err| e.borrow_mut().push(err.clone()));
    session.connect();

    pump_until(&session, &mut events, || session.status() == ConnectionStatus::Error).await;
    let errors = errors.borrow();
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], SessionError::Transport { attempt: 1, .. }));
    assert!(matches!(errors[1], SessionError::RetriesExhausted { attempts: 2, .. }));
}

#[tokio::test]
async fn silent_broker_is_dropped_after_missed_heartbeats() {
    let (url, _seen, mut beats) = start_broker(Mode::SilentHeartbeats).await;
    let (connector, mut events) = WsConnector::new();
    let mut opts = options(&url, 5);
    opts.heartbeat_outgoing = Duration::from_millis(100);
    opts.heartbeat_incoming = Duration::from_millis(100);
    let session = Session::new(opts, connector);
    session.initialize(None);

    let errors: Rc<RefCell<Vec<SessionError>>> = Rc::default();
    let e = errors.clone();
    let _on_error = session.on_error(move |err| e.borrow_mut().push(err.clone()));
    let connects = Rc::new(RefCell::new(0));
    let c = connects.clone();
    let _on_connect = session.on_connect(move |_| *c.borrow_mut() += 1);
    let drops = Rc::new(RefCell::new(0));
    let d = drops.clone();
    let _on_disconnect = session.on_disconnect(move |_| *d.borrow_mut() += 1);
    session.connect();

    // Connected, timed out, and connected again.
    pump_until(&session, &mut events, || *connects.borrow() >= 2).await;
    assert!(session.is_connected());
    assert_eq!(session.reconnect_attempts(), 0);
    assert!(*drops.borrow() >= 1);
    assert_eq!(
        errors.borrow()[0],
        SessionError::Transport {
            reason: "heart-beat timeout".into(),
            attempt: 1
        }
    );

    // The client kept beating on the first connection before giving up on it.
    let first = timeout(WAIT, beats.recv()).await.expect("no heart-beat").unwrap();
    assert_eq!(first, 1);
}

#[tokio::test]
async fn frames_ahead_of_an_undecodable_one_are_delivered() {
    let (url, _seen, _beats) = start_broker(Mode::TrailingGarbage).await;
    let (connector, mut events) = WsConnector::new();
    let session = Session::new(options(&url, 5), connector);
    session.initialize(None);

    let (got, record) = recorder();
    let _sub = session.subscribe("/user/queue/game", record);
    session.connect();

    pump_until(&session, &mut events, || !got.borrow().is_empty()).await;
    assert_eq!(*got.borrow(), vec![Payload::Json(json!({ "conn": 1 }))]);
    assert!(session.is_connected());
}
