//! STOMP 1.2 text frames.

use std::fmt;

use crate::error::FrameError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    fn parse(s: &str) -> Result<Self, FrameError> {
        Ok(match s {
            "CONNECT" | "STOMP" => Command::Connect,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => return Err(FrameError::UnknownCommand(other.to_string())),
        })
    }

    /// CONNECT and CONNECTED headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

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
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(32 + self.body.len());
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
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Decode a single frame. Leading heart-beat newlines are skipped.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let mut frames = Frame::decode_all(text)?;
        match frames.len() {
            0 => Err(FrameError::Empty),
            _ => Ok(frames.remove(0)),
        }
    }

    /// Decode every frame in a WebSocket message. Heart-beats yield nothing.
    pub fn decode_all(text: &str) -> Result<Vec<Self>, FrameError> {
        let mut frames = Vec::new();
        let mut rest = text;
        loop {
            rest = rest.trim_start_matches(['\r', '\n']);
            if rest.is_empty() {
                break;
            }
            let (frame, remaining) = decode_one(rest)?;
            frames.push(frame);
            rest = remaining;
        }
        Ok(frames)
    }
}

fn decode_one(text: &str) -> Result<(Frame, &str), FrameError> {
    let (head, after_head) = match text.find("\n\n") {
        Some(idx) => (&text[..idx], &text[idx + 2..]),
        None => match text.find("\r\n\r\n") {
            Some(idx) => (&text[..idx], &text[idx + 4..]),
            None => return Err(FrameError::Truncated),
        },
    };

    let mut lines = head.lines();
    let command = Command::parse(lines.next().unwrap_or_default().trim_end_matches('\r'))?;
    let unescape = command.escapes_headers();

    let mut headers = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| FrameError::MalformedHeader(line.to_string()))?;
        if unescape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let declared = headers
        .iter()
        .find(|(name, _)| name == "content-length")
        .and_then(|(_, value)| value.trim().parse::<usize>().ok());

    let (body, remaining) = match declared {
        Some(len) if after_head.len() > len && after_head.is_char_boundary(len) => {
            let remaining = after_head[len..]
                .strip_prefix('\0')
                .ok_or(FrameError::Truncated)?;
            (&after_head[..len], remaining)
        }
        _ => match after_head.find('\0') {
            Some(idx) => (&after_head[..idx], &after_head[idx + 1..]),
            None => return Err(FrameError::Truncated),
        },
    };

    Ok((
        Frame {
            command,
            headers,
            body: body.to_string(),
        },
        remaining,
    ))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, FrameError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(FrameError::InvalidEscape(value.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_frame_wire_format() {
        let encoded = Frame::subscribe("sub-0", "/topic/user/5").encode();
        assert_eq!(
            encoded,
            "SUBSCRIBE\nid:sub-0\ndestination:/topic/user/5\nack:auto\n\n\0"
        );
    }

    #[test]
    fn decodes_message_with_escaped_headers() {
        let raw = "MESSAGE\ndestination:/topic/global\nsubscription:sub-1\nnote:a\\cb\\\\c\n\nDATABASE_RESET\0";
        let frame = Frame::decode(raw).unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("subscription"), Some("sub-1"));
        assert_eq!(frame.get("note"), Some("a:b\\c"));
        assert_eq!(frame.body, "DATABASE_RESET");
    }

    #[test]
    fn connected_headers_are_not_unescaped() {
        let frame = Frame::decode("CONNECTED\nversion:1.2\nserver:broker\\c1\n\n\0").unwrap();
        assert_eq!(frame.get("server"), Some("broker\\c1"));
    }

    #[test]
    fn honours_content_length_with_embedded_nul() {
        let raw = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = Frame::decode(raw).unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn heartbeats_and_multiple_frames() {
        assert!(Frame::decode_all("\n\r\n").unwrap().is_empty());

        let raw = "\nRECEIPT\nreceipt-id:1\n\n\0\nERROR\nmessage:bad\n\noops\0";
        let frames = Frame::decode_all(raw).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].command, Command::Error);
        assert_eq!(frames[1].body, "oops");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(Frame::decode(""), Err(FrameError::Empty)));
        assert!(matches!(
            Frame::decode("HELLO\n\n\0"),
            Err(FrameError::UnknownCommand(_))
        ));
        assert!(matches!(
            Frame::decode("MESSAGE\nbroken\n\n\0"),
            Err(FrameError::MalformedHeader(_))
        ));
        assert!(matches!(
            Frame::decode("MESSAGE\nx:\\t\n\n\0"),
            Err(FrameError::InvalidEscape(_))
        ));
        assert!(matches!(
            Frame::decode("MESSAGE\n\nno terminator"),
            Err(FrameError::Truncated)
        ));
    }

    #[test]
    fn encoded_frames_decode_back() {
        let frame = Frame::new(Command::Send)
            .header("destination", "/app/ping")
            .header("weird", "line\nbreak")
            .body("{\"n\":1}");
        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.get("weird"), Some("line\nbreak"));
        assert_eq!(decoded.body, frame.body);
    }
}
