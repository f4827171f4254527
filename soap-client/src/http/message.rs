use std::borrow::Cow;
use std::io::{BufRead, Read, Write};

use super::headers::HttpHeaders;
use super::{
    CHUNKED, CLOSE, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HTTP_1_0, KEEP_ALIVE, TRANSFER_ENCODING,
};
use crate::SoapError;

const CRLF: &[u8] = b"\r\n";
const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Largest body accepted from a peer, whatever its framing
pub const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// First line of an HTTP message.
///
/// Requests and responses only differ in how their start line is rendered
/// and parsed; everything else lives in [`HttpMessage`].
pub trait StartLine: Clone + std::fmt::Debug {
    /// Whether a body without length or chunking runs until the peer closes
    const BODY_UNTIL_CLOSE: bool;

    fn version(&self) -> &str;

    fn set_version(&mut self, version: &str);

    fn render(&self) -> String;

    fn parse(line: &str) -> Result<Self, SoapError>
    where
        Self: Sized;
}

/// Headers and body shared by requests and responses, plus a start line.
#[derive(Debug, Clone)]
pub struct HttpMessage<L: StartLine> {
    start_line: L,
    headers: HttpHeaders,
    body: Option<Vec<u8>>,
}

impl<L: StartLine> HttpMessage<L> {
    pub fn from_start_line(start_line: L) -> Self {
        Self {
            start_line,
            headers: HttpHeaders::new(),
            body: None,
        }
    }

    pub fn start_line(&self) -> &L {
        &self.start_line
    }

    pub(crate) fn start_line_mut(&mut self) -> &mut L {
        &mut self.start_line
    }

    pub fn version(&self) -> &str {
        self.start_line.version()
    }

    pub fn set_version(&mut self, version: &str) {
        self.start_line.set_version(version);
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Parse a raw `Name: value` line; lines without a colon are ignored
    pub fn set_header_line(&mut self, line: &str) {
        if let Some((name, value)) = line.split_once(':') {
            self.headers.set(name.trim(), value.trim());
        }
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn is_chunked(&self) -> bool {
        self.headers.contains_value(TRANSFER_ENCODING, CHUNKED)
    }

    pub fn is_keep_alive(&self) -> bool {
        if self.version() == HTTP_1_0 {
            return self.headers.contains_value(CONNECTION, KEEP_ALIVE);
        }
        !self.headers.contains_value(CONNECTION, CLOSE)
    }

    /// Length of the body on the wire.
    ///
    /// A chunked message reports its decoded body length; any
    /// `Content-Length` header it carries is not consulted.
    pub fn content_length(&self) -> Option<usize> {
        if self.is_chunked() {
            return self.body.as_ref().map(Vec::len);
        }
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn set_body(&mut self, body: &str, with_content_length: bool) {
        self.set_body_bytes(body.as_bytes().to_vec(), with_content_length);
    }

    pub fn set_body_bytes(&mut self, body: Vec<u8>, with_content_length: bool) {
        if self.is_chunked() {
            self.headers.remove(CONTENT_LENGTH);
        } else if with_content_length {
            self.headers.set(CONTENT_LENGTH, body.len().to_string());
        }
        self.body = Some(body);
    }

    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Body decoded as text using the charset from `Content-Type`
    pub fn body(&self) -> Option<Cow<'_, str>> {
        let bytes = self.body.as_deref()?;
        match self.charset().as_deref() {
            Some("iso-8859-1") | Some("latin1") | Some("us-ascii") => {
                Some(Cow::Owned(bytes.iter().map(|&b| b as char).collect()))
            }
            _ => Some(String::from_utf8_lossy(bytes)),
        }
    }

    fn charset(&self) -> Option<String> {
        let content_type = self.headers.get(CONTENT_TYPE)?;
        content_type.split(';').skip(1).find_map(|param| {
            let (key, value) = param.split_once('=')?;
            if key.trim().eq_ignore_ascii_case("charset") {
                Some(value.trim().trim_matches('"').to_ascii_lowercase())
            } else {
                None
            }
        })
    }

    fn header_block(&self) -> String {
        let mut block = self.start_line.render();
        block.push_str("\r\n");
        let chunked = self.is_chunked();
        for (name, value) in self.headers.iter() {
            if chunked && name.eq_ignore_ascii_case(CONTENT_LENGTH) {
                continue;
            }
            block.push_str(name);
            block.push_str(": ");
            block.push_str(value);
            block.push_str("\r\n");
        }
        block.push_str("\r\n");
        block
    }

    /// Serialize the message onto `writer`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.header_block().as_bytes())?;
        if let Some(body) = &self.body {
            if self.is_chunked() {
                write_chunked(writer, body)?;
            } else {
                writer.write_all(body)?;
            }
        }
        writer.flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_to(&mut buffer);
        buffer
    }

    /// Read one message from `reader`.
    ///
    /// A malformed start line or chunk header, or a body larger than
    /// [`MAX_BODY_SIZE`], is a [`SoapError::Parse`]; a stream that ends early
    /// is a [`SoapError::Transport`].
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self, SoapError> {
        let line = read_line(reader)?.ok_or_else(|| {
            SoapError::Transport("connection closed before start line".to_string())
        })?;
        if line.is_empty() {
            return Err(SoapError::Parse("Illegal start line: empty".to_string()));
        }
        let start_line = L::parse(&line)
            .map_err(|_| SoapError::Parse(format!("Illegal start line: {line}")))?;

        let mut message = Self::from_start_line(start_line);
        loop {
            let line = read_line(reader)?
                .ok_or_else(|| SoapError::Transport("stream ended inside headers".to_string()))?;
            if line.is_empty() {
                break;
            }
            message.set_header_line(&line);
        }

        let body = if message.is_chunked() {
            message.headers.remove(CONTENT_LENGTH);
            read_chunked(reader)?
        } else if let Some(length) = message.content_length() {
            if length > MAX_BODY_SIZE {
                return Err(body_too_large(length));
            }
            let body = read_limited(reader, length)?;
            if body.len() < length {
                return Err(SoapError::Transport(format!(
                    "stream ended after {} of {} body bytes",
                    body.len(),
                    length
                )));
            }
            body
        } else if L::BODY_UNTIL_CLOSE && !message.is_keep_alive() {
            let body = read_limited(reader, MAX_BODY_SIZE + 1)?;
            if body.len() > MAX_BODY_SIZE {
                return Err(body_too_large(body.len()));
            }
            body
        } else {
            Vec::new()
        };
        message.body = Some(body);
        Ok(message)
    }

    /// Decode a complete message held in memory
    pub fn decode(bytes: &[u8]) -> Result<Self, SoapError> {
        Self::read_from(&mut std::io::Cursor::new(bytes))
    }
}

impl<L: StartLine> std::fmt::Display for HttpMessage<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.header_block())?;
        if let Some(body) = self.body() {
            f.write_str(&body)?;
        }
        Ok(())
    }
}

fn write_chunked<W: Write>(writer: &mut W, body: &[u8]) -> std::io::Result<()> {
    for chunk in body.chunks(DEFAULT_CHUNK_SIZE) {
        write!(writer, "{:x}\r\n", chunk.len())?;
        writer.write_all(chunk)?;
        writer.write_all(CRLF)?;
    }
    writer.write_all(b"0\r\n\r\n")
}

fn read_chunked<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, SoapError> {
    let mut body = Vec::new();
    loop {
        let line = read_line(reader)?
            .ok_or_else(|| SoapError::Transport("stream ended before chunk size".to_string()))?;
        let size_field = line.split(';').next().unwrap_or("").trim();
        if size_field.is_empty() {
            return Err(SoapError::Parse("Can not read chunk size".to_string()));
        }
        let size = usize::from_str_radix(size_field, 16)
            .map_err(|_| SoapError::Parse(format!("Chunk format error: {line}")))?;
        if size == 0 {
            // trailer headers are ignored up to the terminating blank line
            while let Some(trailer) = read_line(reader)? {
                if trailer.is_empty() {
                    break;
                }
            }
            return Ok(body);
        }
        if body.len().checked_add(size).map_or(true, |total| total > MAX_BODY_SIZE) {
            return Err(body_too_large(size));
        }
        let chunk = read_limited(reader, size)?;
        if chunk.len() < size {
            return Err(SoapError::Transport("stream ended inside chunk".to_string()));
        }
        body.extend_from_slice(&chunk);
        read_line(reader)?;
    }
}

/// Read at most `limit` bytes without allocating for them up front
fn read_limited<R: Read>(reader: &mut R, limit: usize) -> Result<Vec<u8>, SoapError> {
    let mut body = Vec::new();
    reader.by_ref().take(limit as u64).read_to_end(&mut body)?;
    Ok(body)
}

fn body_too_large(size: usize) -> SoapError {
    SoapError::Parse(format!(
        "body of {size} bytes exceeds the {MAX_BODY_SIZE} byte limit"
    ))
}

/// Read up to LF, dropping CR. `None` means the stream ended before any byte.
fn read_line<R: BufRead>(reader: &mut R) -> Result<Option<String>, SoapError> {
    let mut raw = Vec::new();
    let read = reader.read_until(b'\n', &mut raw)?;
    if read == 0 {
        return Ok(None);
    }
    raw.retain(|&b| b != b'\r' && b != b'\n');
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}
