// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! STOMP 1.2 frame encoding and decoding.
//!
//! One WebSocket text message carries one frame, or a bare end-of-line
//! heartbeat. Header values are escaped on every frame except `CONNECT`
//! and `CONNECTED`.

use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};

use crate::error::StompError;

/// STOMP frame commands used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

/// A single STOMP frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// What one WebSocket text message decoded to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Heartbeat,
    Frame(Frame),
}

/// Serialize a frame, including the trailing NUL.
pub fn encode(frame: &Frame) -> String {
    let escape = frame.command.escapes_headers();
    let mut out = String::with_capacity(64 + frame.body.len());
    out.push_str(&frame.command.to_string());
    out.push('\n');
    for (name, value) in &frame.headers {
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
    out.push_str(&frame.body);
    out.push('\0');
    out
}

/// Parse one WebSocket text message.
pub fn decode(text: &str) -> Result<Decoded, StompError> {
    let text = text.trim_start_matches(['\r', '\n']);
    if text.is_empty() {
        return Ok(Decoded::Heartbeat);
    }

    let (head, rest) = split_head(text)?;
    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));

    let command_line = lines.next().unwrap_or_default();
    let command = Command::from_str(command_line)
        .map_err(|_| StompError::Protocol(format!("unknown command {command_line:?}")))?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| StompError::Protocol(format!("malformed header line {line:?}")))?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let frame = Frame {
        command,
        body: String::new(),
        headers,
    };
    let body = match frame.get("content-length") {
        Some(len) => {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| StompError::Protocol(format!("bad content-length {len:?}")))?;
            rest.get(..len)
                .ok_or_else(|| StompError::Protocol("body shorter than content-length".into()))?
        }
        None => rest.split('\0').next().unwrap_or_default(),
    };

    Ok(Decoded::Frame(Frame {
        body: body.to_string(),
        ..frame
    }))
}

/// Split at the blank line that ends the headers.
fn split_head(text: &str) -> Result<(&str, &str), StompError> {
    if let Some(at) = text.find("\n\n") {
        return Ok((&text[..at], &text[at + 2..]));
    }
    if let Some(at) = text.find("\r\n\r\n") {
        return Ok((&text[..at], &text[at + 4..]));
    }
    Err(StompError::Protocol("frame has no header terminator".into()))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
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
                return Err(StompError::Protocol(format!(
                    "invalid header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )));
            }
        }
    }
    Ok(out)
}

/// Negotiated heartbeat intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Heartbeat {
    /// How often we must send something. `None` disables.
    pub send_every: Option<Duration>,
    /// How often the server promised to send something. `None` disables.
    pub expect_every: Option<Duration>,
}

/// Value of the `heart-beat` header a client sends.
pub fn heartbeat_header(outgoing: Duration, incoming: Duration) -> String {
    format!("{},{}", outgoing.as_millis(), incoming.as_millis())
}

/// Combine our heartbeat wishes with the server's `heart-beat` header.
pub fn negotiate_heartbeat(outgoing: Duration, incoming: Duration, server: Option<&str>) -> Heartbeat {
    let (sx, sy) = server
        .and_then(|h| h.split_once(','))
        .and_then(|(x, y)| Some((x.trim().parse::<u64>().ok()?, y.trim().parse::<u64>().ok()?)))
        .unwrap_or((0, 0));
    let pick = |ours: Duration, theirs: u64| {
        let ours = ours.as_millis() as u64;
        (ours != 0 && theirs != 0).then(|| Duration::from_millis(ours.max(theirs)))
    };
    Heartbeat {
        send_every: pick(outgoing, sy),
        expect_every: pick(incoming, sx),
    }
}
