//! STOMP frame codec.
//!
//! A frame is a command line, header lines, a blank line, and a body
//! terminated by NUL. Bare end-of-line bytes between frames are heart-beats.

mod headers;

pub use headers::{names, Headers};

use bridge_core::BrokerError;
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Largest body accepted from the broker
pub const MAX_BODY_LEN: usize = 16 * 1024 * 1024;

/// Frame commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client frames
    Connect,
    Stomp,
    Send,
    Begin,
    Commit,
    Abort,
    Disconnect,
    // Broker frames
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Stomp => "STOMP",
            Self::Send => "SEND",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Abort => "ABORT",
            Self::Disconnect => "DISCONNECT",
            Self::Connected => "CONNECTED",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CONNECT" => Some(Self::Connect),
            "STOMP" => Some(Self::Stomp),
            "SEND" => Some(Self::Send),
            "BEGIN" => Some(Self::Begin),
            "COMMIT" => Some(Self::Commit),
            "ABORT" => Some(Self::Abort),
            "DISCONNECT" => Some(Self::Disconnect),
            "CONNECTED" => Some(Self::Connected),
            "MESSAGE" => Some(Self::Message),
            "RECEIPT" => Some(Self::Receipt),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// CONNECT and CONNECTED headers are never escaped
    const fn escapes_headers(self) -> bool {
        !matches!(self, Self::Connect | Self::Stomp | Self::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command, headers: Headers) -> Self {
        Self {
            command,
            headers,
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Header lookup shortcut
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }

    /// Body as text, lossy
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Encode the frame to wire bytes
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let escape = self.command.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());

        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');
        for (key, value) in self.headers.iter() {
            if escape {
                out.extend_from_slice(escape_header(key).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(key.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn unescape_header(s: &str) -> Result<String, BrokerError> {
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
            other => {
                return Err(BrokerError::Protocol(format!(
                    "invalid header escape sequence: \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

async fn read_line<R>(reader: &mut R) -> Result<Option<String>, BrokerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| BrokerError::Protocol("frame line is not valid UTF-8".to_string()))
}

fn unexpected_eof() -> BrokerError {
    BrokerError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "connection closed in the middle of a frame",
    ))
}

/// Read the next frame, skipping heart-beats
///
/// Returns `Ok(None)` when the stream ends cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, BrokerError>
where
    R: AsyncBufRead + Unpin,
{
    let command_line = loop {
        match read_line(reader).await? {
            None => return Ok(None),
            Some(line) if line.is_empty() => {
                tracing::trace!("heart-beat received");
            }
            Some(line) => break line,
        }
    };

    // NUL bytes left over from a previous frame may precede the command
    let command_text = command_line.trim_start_matches('\0');
    let command = Command::from_str(command_text)
        .ok_or_else(|| BrokerError::Protocol(format!("unknown command: {command_text}")))?;

    let mut headers = Headers::new();
    loop {
        let line = read_line(reader).await?.ok_or_else(unexpected_eof)?;
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| BrokerError::Protocol(format!("malformed header line: {line}")))?;
        if command.escapes_headers() {
            headers.add(unescape_header(key)?, unescape_header(value)?);
        } else {
            headers.add(key, value);
        }
    }

    let body = match headers.get(names::CONTENT_LENGTH) {
        Some(len) => {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| BrokerError::Protocol(format!("invalid content-length: {len}")))?;
            if len > MAX_BODY_LEN {
                return Err(BrokerError::Protocol(format!("frame body too large: {len}")));
            }
            let mut body = vec![0; len + 1];
            reader.read_exact(&mut body).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    unexpected_eof()
                } else {
                    BrokerError::Io(e)
                }
            })?;
            if body.pop() != Some(0) {
                return Err(BrokerError::Protocol(
                    "frame body not terminated by NUL".to_string(),
                ));
            }
            body
        }
        None => {
            let mut body = Vec::new();
            reader.read_until(0, &mut body).await?;
            if body.pop() != Some(0) {
                return Err(unexpected_eof());
            }
            body
        }
    };

    Ok(Some(Frame {
        command,
        headers,
        body,
    }))
}
