//! STOMP 1.2 frame codec
//!
//! Frames travel as WebSocket text messages:
//!
//! ```text
//! COMMAND
//! header:value
//!
//! body^@
//! ```
//!
//! A single text message may carry several frames, and bare end-of-line
//! characters between frames are heart-beats. Header values are escaped on
//! every frame except `CONNECT` and `CONNECTED`.

use crate::errors::{ServiceError, ServiceResult};
use std::fmt;
use std::time::Duration;

/// STOMP command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Client handshake
    Connect,
    /// Client handshake (1.2 alias)
    Stomp,
    /// Server handshake reply
    Connected,
    /// Client publish
    Send,
    /// Client subscription
    Subscribe,
    /// Client subscription removal
    Unsubscribe,
    /// Server delivery
    Message,
    /// Server receipt
    Receipt,
    /// Server error
    Error,
    /// Client shutdown
    Disconnect,
}

impl Command {
    /// Wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Connected => "CONNECTED",
            Self::Send => "SEND",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
            Self::Disconnect => "DISCONNECT",
        }
    }

    fn from_wire(line: &str) -> Option<Self> {
        Some(match line {
            "CONNECT" => Self::Connect,
            "STOMP" => Self::Stomp,
            "CONNECTED" => Self::Connected,
            "SEND" => Self::Send,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            _ => return None,
        })
    }

    /// Handshake frames carry raw header values
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STOMP frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command
    pub command: Command,
    /// Headers in wire order; repeated names keep the first value
    pub headers: Vec<(String, String)>,
    /// Body text
    pub body: String,
}

impl Frame {
    /// Frame with no headers and an empty body
    #[must_use]
    pub const fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Append a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Client handshake for virtual host `host`, offering `heart_beat` both ways
    ///
    /// A zero duration opts out of heart-beating.
    #[must_use]
    pub fn connect(host: &str, heart_beat: Duration) -> Self {
        let millis = heart_beat.as_millis();
        Self::new(Command::Connect)
            .with_header("accept-version", "1.2,1.1,1.0")
            .with_header("host", host)
            .with_header("heart-beat", format!("{millis},{millis}"))
    }

    /// Subscribe to `destination` under subscription `id`
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(Command::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
            .with_header("ack", "auto")
    }

    /// Drop subscription `id`
    #[must_use]
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(Command::Unsubscribe).with_header("id", id)
    }

    /// Publish a JSON `body` to `destination`
    #[must_use]
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Self::new(Command::Send)
            .with_header("destination", destination)
            .with_header("content-type", "application/json")
            .with_header("content-length", body.len().to_string())
            .with_body(body)
    }

    /// Graceful shutdown
    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(Command::Disconnect)
    }

    /// Serialize to wire text, including the trailing NUL
    #[must_use]
    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(self.body.len() + 64);
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode every frame in one WebSocket text message
    ///
    /// Heart-beats yield nothing. A truncated or malformed frame is an error.
    pub fn parse_all(text: &str) -> ServiceResult<Vec<Self>> {
        let mut frames = Vec::new();
        let mut rest = text;

        loop {
            rest = rest.trim_start_matches(['\r', '\n']);
            if rest.is_empty() {
                break;
            }
            let (frame, remaining) = Self::parse_one(rest)?;
            frames.push(frame);
            rest = remaining;
        }

        Ok(frames)
    }

    fn parse_one(input: &str) -> ServiceResult<(Self, &str)> {
        let (command_line, mut rest) = split_line(input)?;
        let command = Command::from_wire(command_line).ok_or_else(|| {
            ServiceError::Protocol(format!("unknown STOMP command '{command_line}'"))
        })?;

        let mut frame = Self::new(command);
        loop {
            let (line, after) = split_line(rest)?;
            rest = after;
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                ServiceError::Protocol(format!("malformed header line '{line}'"))
            })?;
            if command.escapes_headers() {
                frame
                    .headers
                    .push((unescape_header(name)?, unescape_header(value)?));
            } else {
                frame.headers.push((name.to_string(), value.to_string()));
            }
        }

        let content_length = frame
            .header("content-length")
            .map(|v| {
                v.trim().parse::<usize>().map_err(|e| {
                    ServiceError::Protocol(format!("invalid content-length '{v}': {e}"))
                })
            })
            .transpose()?;

        let (body, after) = match content_length {
            Some(len) => {
                let body = rest.get(..len).ok_or_else(|| {
                    ServiceError::Protocol(format!("body shorter than content-length {len}"))
                })?;
                let after = rest[len..].strip_prefix('\0').ok_or_else(|| {
                    ServiceError::Protocol("missing NUL after sized body".to_string())
                })?;
                (body, after)
            }
            None => {
                let end = rest
                    .find('\0')
                    .ok_or_else(|| ServiceError::Protocol("unterminated frame".to_string()))?;
                (&rest[..end], &rest[end + 1..])
            }
        };

        frame.body = body.to_string();
        Ok((frame, after))
    }
}

/// Heart-beat intervals agreed during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    /// How often the client must send something; `None` when disabled
    pub outgoing: Option<Duration>,
    /// How often the server promised to send something; `None` when disabled
    pub incoming: Option<Duration>,
}

impl HeartBeat {
    /// Combine the client's offer with the server's `heart-beat` header
    ///
    /// Each direction runs at the slower of the two sides and is off when
    /// either side sent zero. A missing or malformed header disables both.
    #[must_use]
    pub fn negotiate(offered: Duration, server: Option<&str>) -> Self {
        let Some((sx, sy)) = server.and_then(parse_heart_beat) else {
            return Self::default();
        };
        let cx = offered.as_millis() as u64;
        let agree = |client: u64, server: u64| {
            (client > 0 && server > 0).then(|| Duration::from_millis(client.max(server)))
        };
        Self {
            outgoing: agree(cx, sy),
            incoming: agree(cx, sx),
        }
    }
}

fn parse_heart_beat(value: &str) -> Option<(u64, u64)> {
    let (x, y) = value.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

fn split_line(input: &str) -> ServiceResult<(&str, &str)> {
    let end = input
        .find('\n')
        .ok_or_else(|| ServiceError::Protocol("truncated frame header".to_string()))?;
    let line = input[..end].strip_suffix('\r').unwrap_or(&input[..end]);
    Ok((line, &input[end + 1..]))
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(raw: &str) -> ServiceResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
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
            other => {
                return Err(ServiceError::Protocol(format!(
                    "undefined header escape '\\{}'",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}
