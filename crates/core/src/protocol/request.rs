use std::borrow::Cow;

use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::headers::HeaderMap;
use crate::protocol::method::Method;

/// First byte of an interleaved RTP/RTCP frame on the RTSP connection
/// (RFC 2326 §10.12).
pub const INTERLEAVED_MARKER: u8 = b'$';

/// A parsed RTSP request (RFC 2326 §6).
///
/// RTSP requests follow HTTP/1.1 syntax:
///
/// ```text
/// Method SP Request-URI SP RTSP-Version CRLF
/// *(Header: Value CRLF)
/// CRLF
/// [body]
/// ```
///
/// Header lookup is case-insensitive per RFC 2326 §4.2. The body is kept as
/// raw bytes; `content_length` is what the client announced, which may be
/// more than `body.len()` until the rest has been read from the socket
/// (see [`missing_body_len`](Self::missing_body_len)).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspRequest {
    /// Method token as received. See [`method`](Self::method) for the typed form.
    pub method: String,
    /// Request-URI (e.g. `rtsp://host:port/stream/track1`).
    pub uri: String,
    /// Protocol name from the version field (expected: `RTSP`).
    pub protocol: String,
    pub major: u32,
    pub minor: u32,
    pub headers: HeaderMap,
    /// Value of `Content-Length`, or 0 when absent or unparseable.
    pub content_length: usize,
    pub body: Vec<u8>,
}

impl RtspRequest {
    /// An RTSP/1.0 request carrying only a `CSeq` header.
    pub fn new(method: Method, uri: &str, cseq: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.append("CSeq", cseq);
        RtspRequest {
            method: method.as_str().to_string(),
            uri: uri.to_string(),
            protocol: "RTSP".to_string(),
            major: 1,
            minor: 0,
            headers,
            content_length: 0,
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attach a body and set `Content-Length` to match it.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self.content_length = self.body.len();
        self.headers
            .set("Content-Length", &self.content_length.to_string());
        self
    }

    /// Encode to the wire format: request line, headers in order, blank
    /// line, body.
    pub fn serialize(&self) -> Vec<u8> {
        let mut head = format!(
            "{} {} {}/{}.{}\r\n",
            self.method, self.uri, self.protocol, self.major, self.minor
        );
        for (name, value) in self.headers.iter() {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }

    /// Decode a request from the bytes of one socket read.
    ///
    /// Returns `Ok(None)` for an interleaved binary frame, which callers
    /// drop without replying. A header section that ends without a blank
    /// line keeps the headers seen so far and an empty body. Bytes past
    /// `Content-Length` are discarded.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.first() == Some(&INTERLEAVED_MARKER) {
            return Ok(None);
        }

        let start = buf
            .iter()
            .position(|b| *b != b'\r' && *b != b'\n')
            .ok_or(RtspError::parse(ParseErrorKind::EmptyRequest))?;
        let buf = &buf[start..];

        let (head, rest) = match header_end(buf) {
            Some((head_end, body_start)) => (&buf[..head_end], &buf[body_start..]),
            None => (buf, &[][..]),
        };

        let head =
            std::str::from_utf8(head).map_err(|_| RtspError::parse(ParseErrorKind::NotUtf8))?;
        let mut lines = head.lines();

        let request_line = lines
            .next()
            .ok_or(RtspError::parse(ParseErrorKind::EmptyRequest))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(RtspError::parse(ParseErrorKind::InvalidRequestLine));
        }

        let (protocol, major, minor) = parse_version(parts[2])?;
        if protocol != "RTSP" || (major, minor) != (1, 0) {
            tracing::warn!(version = parts[2], "client sent non-RTSP/1.0 version");
        }

        let mut headers = HeaderMap::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or(RtspError::parse(ParseErrorKind::InvalidHeader))?;
            headers.append(name.trim(), value.trim());
        }

        let content_length = headers
            .get("Content-Length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        let take = rest.len().min(content_length);
        if rest.len() > take {
            tracing::trace!(discarded = rest.len() - take, "bytes past Content-Length dropped");
        }

        Ok(Some(RtspRequest {
            method: parts[0].to_string(),
            uri: parts[1].to_string(),
            protocol,
            major,
            minor,
            headers,
            content_length,
            body: rest[..take].to_vec(),
        }))
    }

    /// The method as a member of the fixed vocabulary, if it is one.
    pub fn method(&self) -> Option<Method> {
        self.method.parse().ok()
    }

    /// Look up a header value by name (case-insensitive, per RFC 2326 §4.2).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns the CSeq header value, which numbers and orders RTSP
    /// request/response pairs (RFC 2326 §12.17).
    ///
    /// Every RTSP request must include a CSeq, and the response must echo it.
    pub fn cseq(&self) -> Option<&str> {
        self.get_header("CSeq")
    }

    /// Session ID from the Session header.
    /// Handles timeout suffix: "SESSIONID;timeout=60" -> "SESSIONID"
    pub fn session_id(&self) -> Option<&str> {
        self.get_header("Session")
            .map(|s| s.split(';').next().unwrap_or(s).trim())
            .filter(|s| !s.is_empty())
    }

    /// Body bytes announced by `Content-Length` but not yet received.
    pub fn missing_body_len(&self) -> usize {
        self.content_length.saturating_sub(self.body.len())
    }

    /// Append bytes from a follow-up read, never growing past `Content-Length`.
    pub fn append_body(&mut self, bytes: &[u8]) {
        let take = bytes.len().min(self.missing_body_len());
        self.body.extend_from_slice(&bytes[..take]);
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Absolute path of the Request-URI, without scheme and authority.
    pub fn path(&self) -> &str {
        let after_scheme = self
            .uri
            .strip_prefix("rtsp://")
            .or_else(|| self.uri.strip_prefix("rtsps://"));
        match after_scheme {
            Some(rest) => rest.find('/').map(|idx| &rest[idx..]).unwrap_or("/"),
            None => &self.uri,
        }
    }

    /// Split the path at its last `/` into `(prefix, suffix)`.
    ///
    /// `rtsp://host/live/cam/trackID=1` gives `("live/cam", "trackID=1")`;
    /// a single-segment path has an empty prefix.
    pub fn path_components(&self) -> (&str, &str) {
        let path = self.path().trim_matches('/');
        path.rsplit_once('/').unwrap_or(("", path))
    }
}

/// Parse `NAME/major.minor`.
pub(crate) fn parse_version(s: &str) -> Result<(String, u32, u32)> {
    let invalid = || RtspError::parse(ParseErrorKind::InvalidVersion);

    let (name, numbers) = s.split_once('/').ok_or_else(invalid)?;
    let (major, minor) = numbers.split_once('.').ok_or_else(invalid)?;
    let major = major.parse().map_err(|_| invalid())?;
    let minor = minor.parse().map_err(|_| invalid())?;

    Ok((name.to_string(), major, minor))
}

/// Locate the blank line ending the header section.
/// Returns (end of header bytes, start of body bytes).
fn header_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    for (i, b) in buf.iter().enumerate() {
        if *b != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some((line_start, i + 1));
        }
        line_start = i + 1;
    }
    None
}
