// crates/stomp-protocol/tests/broker_transcript.rs
//
// A short exchange as a Spring-style broker writes it: CONNECTED, a
// heart-beat, then two MESSAGE frames packed into one WebSocket message.
use serde_json::json;
use session_core::{Message, Payload};
use stomp_protocol::{decode_all, inbound_from_frame, Command, Decoded, HeartBeat};

const CONNECTED: &str = "CONNECTED\nversion:1.2\nheart-beat:0,0\nuser-name:12345678\n\n\0";

const BATCH: &str = concat!(
    "\n",
    "MESSAGE\ndestination:/user/queue/game\ncontent-type:application/json\n",
    "subscription:sub-0\nmessage-id:m-1\ncontent-length:17\n\n{\"totalScore\":12}\0",
    "MESSAGE\ndestination:/topic/messages\nsubscription:sub-1\nmessage-id:m-2\n\n{not json\0",
);

#[test]
fn connected_frame_disables_heart_beats() {
    let items = decode_all(CONNECTED).unwrap();
    let Decoded::Frame(frame) = &items[0] else {
        panic!("expected CONNECTED");
    };
    assert_eq!(frame.command, Command::Connected);

    let server = HeartBeat::parse(frame.get("heart-beat").unwrap()).unwrap();
    let n = HeartBeat::negotiate(HeartBeat::new(10_000, 10_000), server);
    assert_eq!(n.send_every, None);
    assert_eq!(n.expect_every, None);
}

#[test]
fn batch_maps_to_routed_messages() {
    let frames: Vec<_> = decode_all(BATCH)
        .unwrap()
        .into_iter()
        .filter_map(|d| match d {
            Decoded::Frame(f) => Some(f),
            Decoded::Heartbeat => None,
        })
        .collect();
    assert_eq!(frames.len(), 2);

    let inbound: Vec<_> = frames
        .into_iter()
        .map(|f| inbound_from_frame(f).unwrap())
        .collect();
    assert_eq!(inbound[0].subscription.as_deref(), Some("sub-0"));

    let game = Message::from_frame(&inbound[0]);
    assert_eq!(game.payload, Payload::Json(json!({ "totalScore": 12 })));

    let chat = Message::from_frame(&inbound[1]);
    assert_eq!(chat.payload, Payload::Text("{not json".into()));
}
