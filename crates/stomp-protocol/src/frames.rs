//! Mapping between session-core logical messages and STOMP frames.

use session_core::{Body, Headers, InboundFrame, OutboundMessage};

use crate::frame_codec::{Frame, ProtocolError};
use crate::wire_types::{header, Command, HeartBeat, JSON_CONTENT_TYPE};

/// CONNECT frame. Caller-supplied headers never override the protocol ones.
pub fn connect_frame(host: &str, accept_version: &str, heart_beat: HeartBeat, connect_headers: &Headers) -> Frame {
    let frame = Frame::new(Command::Connect)
        .header(header::ACCEPT_VERSION, accept_version)
        .header(header::HOST, host)
        .header(header::HEART_BEAT, heart_beat.to_header());
    merge(frame, connect_headers)
}

pub fn subscribe_frame(id: &str, destination: &str, headers: &Headers) -> Frame {
    let frame = Frame::new(Command::Subscribe)
        .header(header::ID, id)
        .header(header::DESTINATION, destination)
        .header(header::ACK, "auto");
    merge(frame, headers)
}

pub fn unsubscribe_frame(id: &str) -> Frame {
    Frame::new(Command::Unsubscribe).header(header::ID, id)
}

pub fn send_frame(message: &OutboundMessage) -> Frame {
    let body = message.body.to_text();

    let mut frame = Frame::new(Command::Send).header(header::DESTINATION, &message.destination);
    if matches!(message.body, Body::Json(_)) && message.headers.get(header::CONTENT_TYPE).is_none() {
        frame = frame.header(header::CONTENT_TYPE, JSON_CONTENT_TYPE);
    }
    let mut frame = merge(frame, &message.headers);
    if !body.is_empty() {
        frame = frame.header(header::CONTENT_LENGTH, body.len().to_string());
    }
    frame.with_body(body)
}

pub fn disconnect_frame(receipt: &str) -> Frame {
    Frame::new(Command::Disconnect).header(header::RECEIPT, receipt)
}

/// Turn a MESSAGE frame into what the session routes.
pub fn inbound_from_frame(frame: Frame) -> Result<InboundFrame, ProtocolError> {
    if frame.command != Command::Message {
        return Err(ProtocolError::UnexpectedCommand(frame.command));
    }
    let destination = frame
        .get(header::DESTINATION)
        .ok_or(ProtocolError::MissingHeader {
            command: Command::Message,
            header: header::DESTINATION,
        })?
        .to_string();
    let subscription = frame.get(header::SUBSCRIPTION).map(str::to_string);

    Ok(InboundFrame {
        destination,
        subscription,
        body: frame.body,
        headers: frame.headers,
    })
}

/// `message` header and body of an ERROR frame.
pub fn broker_error(frame: &Frame) -> (String, Option<String>) {
    let message = frame
        .get(header::MESSAGE)
        .filter(|m| !m.is_empty())
        .unwrap_or("broker reported an error")
        .to_string();
    let details = Some(frame.body.trim_end_matches('\0'))
        .filter(|b| !b.trim().is_empty())
        .map(str::to_string);
    (message, details)
}

fn merge(mut frame: Frame, extra: &Headers) -> Frame {
    for (name, value) in extra.iter() {
        if frame.get(name).is_none() {
            frame.headers.append(name, value);
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_send_carries_type_and_length() {
        let msg = OutboundMessage::new("/app/game/start", json!({}));
        let frame = send_frame(&msg);
        assert_eq!(frame.get(header::DESTINATION), Some("/app/game/start"));
        assert_eq!(frame.get(header::CONTENT_TYPE), Some(JSON_CONTENT_TYPE));
        assert_eq!(frame.get(header::CONTENT_LENGTH), Some("2"));
        assert_eq!(frame.body, "{}");
    }

    #[test]
    fn text_send_has_no_content_type_and_empty_has_no_length() {
        let frame = send_frame(&OutboundMessage::new("/app/sendMessage", "héllo"));
        assert_eq!(frame.get(header::CONTENT_TYPE), None);
        assert_eq!(frame.get(header::CONTENT_LENGTH), Some("6"));

        let frame = send_frame(&OutboundMessage::new("/app/sendMessage", Body::Empty));
        assert_eq!(frame.get(header::CONTENT_LENGTH), None);
    }

    #[test]
    fn user_headers_cannot_redirect_a_send() {
        let headers = Headers::new().with("destination", "/elsewhere").with("priority", "9");
        let msg = OutboundMessage::new("/app/x", "1").with_headers(headers);
        let frame = send_frame(&msg);
        assert_eq!(frame.get(header::DESTINATION), Some("/app/x"));
        assert_eq!(frame.get("priority"), Some("9"));
    }

    #[test]
    fn connect_carries_identity_and_heart_beat() {
        let frame = connect_frame(
            "localhost",
            "1.2",
            HeartBeat::new(10_000, 10_000),
            &Headers::new().with("login", "12345678"),
        );
        assert_eq!(frame.command, Command::Connect);
        assert_eq!(frame.get(header::HEART_BEAT), Some("10000,10000"));
        assert_eq!(frame.get("login"), Some("12345678"));
    }

    #[test]
    fn message_frame_maps_to_inbound() {
        let frame = Frame::new(Command::Message)
            .header(header::DESTINATION, "/user/queue/game")
            .header(header::SUBSCRIPTION, "sub-3")
            .with_body("{}");
        let inbound = inbound_from_frame(frame).unwrap();
        assert_eq!(inbound.destination, "/user/queue/game");
        assert_eq!(inbound.subscription.as_deref(), Some("sub-3"));

        let no_dest = Frame::new(Command::Message);
        assert!(matches!(
            inbound_from_frame(no_dest),
            Err(ProtocolError::MissingHeader { .. })
        ));
        assert!(inbound_from_frame(Frame::new(Command::Receipt)).is_err());
    }

    #[test]
    fn error_frame_yields_message_and_details() {
        let frame = Frame::new(Command::Error)
            .header(header::MESSAGE, "Bad CONNECT")
            .with_body("missing login\n");
        assert_eq!(
            broker_error(&frame),
            ("Bad CONNECT".to_string(), Some("missing login\n".to_string()))
        );
        assert_eq!(
            broker_error(&Frame::new(Command::Error)),
            ("broker reported an error".to_string(), None)
        );
    }
}
