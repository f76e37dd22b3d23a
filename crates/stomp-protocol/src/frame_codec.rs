//! STOMP 1.2 frame encoding/decoding.
//!
//! ```text
//! COMMAND EOL
//! (name:value EOL)*
//! EOL
//! body NUL
//! ```
//!
//! EOL is `\n`, optionally preceded by `\r`. A bare EOL between frames is
//! a heart-beat. Header names and values are escaped for every command
//! except CONNECT and CONNECTED:
//!
//! ```text
//! \\ -> backslash   \n -> LF   \r -> CR   \c -> colon
//! ```
//!
//! The body runs for `content-length` bytes when that header is present,
//! otherwise up to the first NUL. Decoding is streaming: [`decode_next`]
//! reports `None` until a whole item is in the buffer.

use session_core::Headers;
use thiserror::Error;

use crate::wire_types::{header, Command};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("invalid escape sequence in header: {0:?}")]
    InvalidEscape(String),

    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    #[error("invalid content-length: {0:?}")]
    InvalidContentLength(String),

    #[error("invalid heart-beat header: {0:?}")]
    InvalidHeartBeat(String),

    #[error("body not followed by NUL")]
    MissingNull,

    #[error("incomplete frame at end of message")]
    Unterminated,

    #[error("{command} frame without {header} header")]
    MissingHeader {
        command: Command,
        header: &'static str,
    },

    #[error("unexpected {0} frame")]
    UnexpectedCommand(Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Headers,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Frame {
            command,
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// Builder: set a header (replacing an earlier value of the same name).
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Text form, NUL included.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        write_frame(self, &mut out);
        out
    }
}

/// One item read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Frame(Frame),
    Heartbeat,
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode `frame`, appending the bytes to `out`.
pub fn encode_frame(frame: &Frame, out: &mut Vec<u8>) {
    out.extend_from_slice(frame.to_text().as_bytes());
}

fn write_frame(frame: &Frame, out: &mut String) {
    let escape = frame.command.escapes_headers();

    out.push_str(frame.command.as_str());
    out.push('\n');
    for (name, value) in frame.headers.iter() {
        if escape {
            escape_into(name, out);
            out.push(':');
            escape_into(value, out);
        } else {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
        }
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&frame.body);
    out.push('\0');
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
}

fn unescape(s: &str) -> Result<String, ProtocolError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(ProtocolError::InvalidEscape(s.to_string())),
        }
    }
    Ok(out)
}

// ============================================================================
// Decoding
// ============================================================================

/// Decode one item from the front of `buf`.
///
/// Returns the item and the number of bytes it occupied, or `None` if
/// `buf` does not yet hold a complete item.
pub fn decode_next(buf: &[u8]) -> Result<Option<(Decoded, usize)>, ProtocolError> {
    match buf {
        [] | [b'\r'] => return Ok(None),
        [b'\n', ..] => return Ok(Some((Decoded::Heartbeat, 1))),
        [b'\r', b'\n', ..] => return Ok(Some((Decoded::Heartbeat, 2))),
        _ => {}
    }

    let mut pos = 0;

    let Some(line) = next_line(buf, &mut pos)? else {
        return Ok(None);
    };
    let command = Command::parse(line).ok_or_else(|| ProtocolError::UnknownCommand(line.to_string()))?;
    let escaped = command.escapes_headers();

    let mut headers = Headers::new();
    loop {
        let Some(line) = next_line(buf, &mut pos)? else {
            return Ok(None);
        };
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))?;
        if escaped {
            headers.append(unescape(name)?, unescape(value)?);
        } else {
            headers.append(name, value);
        }
    }

    let body_start = pos;
    let body_end = match headers.get(header::CONTENT_LENGTH) {
        Some(raw) => {
            let len: usize = raw
                .trim()
                .parse()
                .map_err(|_| ProtocolError::InvalidContentLength(raw.to_string()))?;
            let end = body_start
                .checked_add(len)
                .ok_or_else(|| ProtocolError::InvalidContentLength(raw.to_string()))?;
            if buf.len() <= end {
                return Ok(None);
            }
            if buf[end] != 0 {
                return Err(ProtocolError::MissingNull);
            }
            end
        }
        None => match buf[body_start..].iter().position(|&b| b == 0) {
            Some(off) => body_start + off,
            None => return Ok(None),
        },
    };

    let body = std::str::from_utf8(&buf[body_start..body_end])
        .map_err(|_| ProtocolError::InvalidUtf8)?
        .to_string();

    let frame = Frame {
        command,
        headers,
        body,
    };
    Ok(Some((Decoded::Frame(frame), body_end + 1)))
}

/// Read one EOL-terminated line starting at `*pos`, advancing past it.
fn next_line<'a>(buf: &'a [u8], pos: &mut usize) -> Result<Option<&'a str>, ProtocolError> {
    let rest = &buf[*pos..];
    let Some(nl) = rest.iter().position(|&b| b == b'\n') else {
        return Ok(None);
    };
    let mut line = &rest[..nl];
    if let [head @ .., b'\r'] = line {
        line = head;
    }
    *pos += nl + 1;
    std::str::from_utf8(line)
        .map(Some)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

/// Decode every item in one complete WebSocket text message.
pub fn decode_all(text: &str) -> Result<Vec<Decoded>, ProtocolError> {
    match decode_leading(text) {
        (items, None) => Ok(items),
        (_, Some(err)) => Err(err),
    }
}

/// Decode items from the front of `text` until the end or the first
/// failure.
///
/// Returns everything that decoded ahead of the failure together with the
/// failure itself, so a bad trailing frame does not hide good ones.
pub fn decode_leading(text: &str) -> (Vec<Decoded>, Option<ProtocolError>) {
    let mut buf = text.as_bytes();
    let mut items = Vec::new();
    while !buf.is_empty() {
        match decode_next(buf) {
            Ok(Some((item, used))) => {
                items.push(item);
                buf = &buf[used..];
            }
            Ok(None) => return (items, Some(ProtocolError::Unterminated)),
            Err(e) => return (items, Some(e)),
        }
    }
    (items, None)
}
