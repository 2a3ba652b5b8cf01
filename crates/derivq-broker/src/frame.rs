//! STOMP 1.2 frame codec.
//!
//! A frame is a command line, header lines, a blank line, the body and a NUL
//! octet. Header names and values are escaped (`\\`, `\n`, `\r`, `:`) in
//! every frame except `CONNECT` and `CONNECTED`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::PublishError;

/// Largest frame body accepted from the broker.
pub const MAX_FRAME_BODY: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name`. Repeated headers keep the first
    /// occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn escapes_headers(&self) -> bool {
        !matches!(self.command.as_str(), "CONNECT" | "CONNECTED")
    }

    pub fn encode(&self) -> Vec<u8> {
        let escape = self.escapes_headers();
        let mut out = Vec::with_capacity(self.body.len() + 128);
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
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

pub fn escape_header(raw: &str) -> String {
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

pub fn unescape_header(raw: &str) -> Result<String, PublishError> {
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
            Some(other) => {
                return Err(PublishError::protocol(format!(
                    "undefined escape sequence \\{other}"
                )));
            }
            None => return Err(PublishError::protocol("dangling escape in header")),
        }
    }
    Ok(out)
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), PublishError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_line<R>(reader: &mut R) -> Result<Option<String>, PublishError>
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
        .map_err(|_| PublishError::protocol("frame header is not valid UTF-8"))
}

/// Read the next frame. Heart-beat EOLs between frames are skipped.
///
/// Returns `Ok(None)` on a clean end of stream before a frame starts.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>, PublishError>
where
    R: AsyncBufRead + Unpin,
{
    let command = loop {
        match read_line(reader).await? {
            None => return Ok(None),
            Some(line) if line.is_empty() => continue,
            Some(line) => break line,
        }
    };
    // NUL left over from a previous frame's trailing padding.
    let command = command.trim_start_matches('\0').to_string();

    let mut frame = Frame::new(command);
    let unescape = frame.escapes_headers();
    loop {
        let Some(line) = read_line(reader).await? else {
            return Err(PublishError::Closed);
        };
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| PublishError::protocol(format!("malformed header line: {line}")))?;
        let (name, value) = if unescape {
            (unescape_header(name)?, unescape_header(value)?)
        } else {
            (name.to_string(), value.to_string())
        };
        frame.headers.push((name, value));
    }

    match frame.get("content-length") {
        Some(len) => {
            let len: usize = len
                .trim()
                .parse()
                .map_err(|_| PublishError::protocol(format!("invalid content-length: {len}")))?;
            if len > MAX_FRAME_BODY {
                return Err(PublishError::frame_too_large(len));
            }
            let mut body = vec![0u8; len];
            reader.read_exact(&mut body).await?;
            let mut nul = [0u8; 1];
            reader.read_exact(&mut nul).await?;
            if nul[0] != 0 {
                return Err(PublishError::protocol("frame body not NUL terminated"));
            }
            frame.body = body;
        }
        None => {
            let mut body = Vec::new();
            (&mut *reader)
                .take(MAX_FRAME_BODY as u64 + 1)
                .read_until(0, &mut body)
                .await?;
            if body.pop() != Some(0) {
                // Limit hit without a terminator.
                if body.len() >= MAX_FRAME_BODY {
                    return Err(PublishError::frame_too_large(body.len() + 1));
                }
                return Err(PublishError::Closed);
            }
            frame.body = body;
        }
    }

    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_send_frame() {
        let frame = Frame::new("SEND")
            .header("destination", "queue:islandora-connector-houdini")
            .header("content-length", "2")
            .body("{}");
        let encoded = frame.encode();
        assert_eq!(
            encoded,
            b"SEND\ndestination:queue\\cislandora-connector-houdini\ncontent-length:2\n\n{}\0"
        );
    }

    #[test]
    fn test_connect_headers_not_escaped() {
        let frame = Frame::new("CONNECT").header("host", "broker:61613");
        assert_eq!(frame.encode(), b"CONNECT\nhost:broker:61613\n\n\0");
    }

    #[test]
    fn test_escape_roundtrip_special_chars() {
        let raw = "a:b\\c\nd\re";
        assert_eq!(unescape_header(&escape_header(raw)).unwrap(), raw);
    }

    #[test]
    fn test_unescape_rejects_undefined_sequence() {
        assert!(matches!(
            unescape_header("bad\\t"),
            Err(PublishError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_read_frame_with_content_length() {
        let mut input: &[u8] = b"\n\nMESSAGE\ncontent-length:5\nx:a\\cb\n\nhe\0lo\0";
        let frame = read_frame(&mut input).await.unwrap().unwrap();
        assert_eq!(frame.command, "MESSAGE");
        assert_eq!(frame.get("x"), Some("a:b"));
        assert_eq!(frame.body, b"he\0lo");
    }

    #[tokio::test]
    async fn test_read_frame_without_content_length() {
        let mut input: &[u8] = b"ERROR\r\nmessage:denied\r\n\r\nnope\0";
        let frame = read_frame(&mut input).await.unwrap().unwrap();
        assert_eq!(frame.command, "ERROR");
        assert_eq!(frame.get("message"), Some("denied"));
        assert_eq!(frame.body_text(), "nope");
    }

    #[tokio::test]
    async fn test_read_frame_end_of_stream() {
        let mut input: &[u8] = b"";
        assert!(read_frame(&mut input).await.unwrap().is_none());

        let mut truncated: &[u8] = b"RECEIPT\nreceipt-id:1\n";
        assert!(matches!(
            read_frame(&mut truncated).await,
            Err(PublishError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_oversized_content_length_rejected() {
        let mut input: &[u8] = b"CONNECTED\ncontent-length:18446744073709551615\n\n\0";
        let err = read_frame(&mut input).await.unwrap_err();
        assert!(matches!(err, PublishError::Protocol(ref m) if m.contains("exceeds")));

        let header = format!("MESSAGE\ncontent-length:{}\n\n", MAX_FRAME_BODY + 1);
        let mut input = header.as_bytes();
        assert!(matches!(
            read_frame(&mut input).await,
            Err(PublishError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_unterminated_body_is_bounded() {
        let mut input = b"MESSAGE\n\n".to_vec();
        input.extend(std::iter::repeat_n(b'x', MAX_FRAME_BODY + 8));
        let mut reader = input.as_slice();
        assert!(matches!(
            read_frame(&mut reader).await,
            Err(PublishError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_header_keeps_first() {
        let mut input: &[u8] = b"MESSAGE\nfoo:1\nfoo:2\n\n\0";
        let frame = read_frame(&mut input).await.unwrap().unwrap();
        assert_eq!(frame.get("foo"), Some("1"));
    }
}
