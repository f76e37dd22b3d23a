//! Logical message types exchanged with the broker.
//!
//! These are **transport-agnostic**:
//! - [`OutboundMessage`]: an intent the client sends to a destination.
//! - [`InboundFrame`]: a message the broker delivered for a subscription.
//! - [`Message`]: what a subscription handler actually receives.
//!
//! Frame encoding lives in the `stomp-protocol` crate; this module is
//! purely logical.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Ordered header list.
///
/// STOMP allows a header to repeat; the first occurrence is the one that
/// counts, so lookups return the first match and `insert` replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Headers(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set `name`, replacing the first existing value if present.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Append without replacing; used by decoders that keep repeats.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(idx).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Builder-style `insert`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

/// Body of an outbound message.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Already textual; sent as-is.
    Text(String),
    /// Structured; serialised to compact JSON on the wire.
    Json(Value),
}

impl Body {
    /// Serialise any `Serialize` value into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(Body::Json)
    }

    /// Text form written to the wire.
    pub fn to_text(&self) -> String {
        match self {
            Body::Empty => String::new(),
            Body::Text(s) => s.clone(),
            Body::Json(v) => v.to_string(),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, Body::Json(_))
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Body::Json(v)
    }
}

/// A fire-and-forget intent addressed to a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub destination: String,
    pub body: Body,
    pub headers: Headers,
}

impl OutboundMessage {
    pub fn new(destination: impl Into<String>, body: impl Into<Body>) -> Self {
        OutboundMessage {
            destination: destination.into(),
            body: body.into(),
            headers: Headers::new(),
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }
}

/// A message delivered by the broker, as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub destination: String,

    /// Transport-level subscription id the broker delivered this for,
    /// when the broker supplied one.
    pub subscription: Option<String>,

    /// Raw text body.
    pub body: String,

    pub headers: Headers,
}

impl InboundFrame {
    pub fn new(destination: impl Into<String>, body: impl Into<String>) -> Self {
        InboundFrame {
            destination: destination.into(),
            subscription: None,
            body: body.into(),
            headers: Headers::new(),
        }
    }

    pub fn for_subscription(mut self, id: impl Into<String>) -> Self {
        self.subscription = Some(id.into());
        self
    }
}

/// Opportunistically decoded body.
///
/// Bodies that are not valid JSON are handed over verbatim; that is not
/// a protocol error, only a hint to consumers expecting structured data.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn decode(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(v) => Payload::Json(v),
            Err(_) => Payload::Text(body.to_string()),
        }
    }

    /// Typed view of a structured payload; `None` for raw text or a
    /// shape mismatch.
    pub fn parse<T: DeserializeOwned>(&self) -> Option<T> {
        match self {
            Payload::Json(v) => T::deserialize(v).ok(),
            Payload::Text(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Json(_) => None,
        }
    }
}

/// What a subscription handler receives.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub destination: String,
    pub headers: Headers,
    pub payload: Payload,
}

impl Message {
    pub fn from_frame(frame: &InboundFrame) -> Self {
        Message {
            destination: frame.destination.clone(),
            headers: frame.headers.clone(),
            payload: Payload::decode(&frame.body),
        }
    }
}
