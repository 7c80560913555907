use std::io::{self, BufRead, Read};

use chrono::{DateTime, Utc};

use crate::error::{ParseErrorKind, Result, RtspError};
use crate::protocol::request::parse_version;
use crate::protocol::status::StatusCode;

/// Format of the `Date` header (RFC 1123, RFC 2326 §12.18).
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// An RTSP response (RFC 2326 §7).
///
/// Serializes to the standard text format:
///
/// ```text
/// RTSP/1.0 200 OK\r\n
/// CSeq: 1\r\n
/// Date: Thu, 24 Jan 2019 03:37:02 GMT\r\n
/// Session: 0A1B2C3D\r\n
/// \r\n
/// ```
///
/// Every response starts with the `CSeq` echo and a `Date`, in that order.
/// Chain [`add_header`](Self::add_header) and [`with_body`](Self::with_body),
/// then call [`serialize`](Self::serialize). `Content-Length` is computed
/// automatically when a body is present.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtspResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RtspResponse {
    /// Response stamped with the current time.
    pub fn new(status: StatusCode, cseq: &str) -> Self {
        Self::at(status, cseq, Utc::now())
    }

    /// Response with an explicit `Date` value.
    pub fn at(status: StatusCode, cseq: &str, date: DateTime<Utc>) -> Self {
        RtspResponse {
            status,
            headers: vec![
                ("CSeq".to_string(), cseq.to_string()),
                ("Date".to_string(), date.format(DATE_FORMAT).to_string()),
            ],
            body: None,
        }
    }

    /// 200 OK (RFC 2326 §7.1.1).
    pub fn ok(cseq: &str) -> Self {
        Self::new(StatusCode::OK, cseq)
    }

    /// Decode one complete response from `buf`.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        Self::read_from(&mut buf)
    }

    /// Read one response off a stream: status line, headers up to the blank
    /// line, then exactly `Content-Length` body bytes.
    ///
    /// The reason phrase is not kept; [`StatusCode::reason`] supplies it
    /// again on [`serialize`](Self::serialize). `Content-Length` is likewise
    /// dropped from `headers` and recomputed from the body.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let invalid = || RtspError::parse(ParseErrorKind::InvalidStatusLine);

        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        let mut parts = line.trim_end_matches(['\r', '\n']).splitn(3, ' ');
        parse_version(parts.next().ok_or_else(invalid)?)?;
        let code: u16 = parts
            .next()
            .ok_or_else(invalid)?
            .parse()
            .map_err(|_| invalid())?;

        let mut headers = Vec::new();
        let mut content_length = 0usize;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
            let header = line.trim_end_matches(['\r', '\n']);
            if header.is_empty() {
                break;
            }
            let (name, value) = header
                .split_once(':')
                .ok_or(RtspError::parse(ParseErrorKind::InvalidHeader))?;
            let (name, value) = (name.trim(), value.trim());
            if name.eq_ignore_ascii_case("Content-Length") {
                content_length = value.parse().unwrap_or(0);
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let body = if content_length > 0 {
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body)?;
            Some(String::from_utf8_lossy(&body).into_owned())
        } else {
            None
        };

        Ok(RtspResponse {
            status: StatusCode::from(code),
            headers,
            body,
        })
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// First value of a header, compared case-insensitively.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Serialize to the RTSP text wire format.
    ///
    /// If a body is present, `Content-Length` is appended automatically
    /// (RFC 2326 §12.14).
    pub fn serialize(&self) -> String {
        let mut response = format!(
            "RTSP/1.0 {} {}\r\n",
            self.status.as_u16(),
            self.status.reason()
        );

        for (name, value) in &self.headers {
            response.push_str(&format!("{}: {}\r\n", name, value));
        }

        if let Some(body) = &self.body {
            response.push_str(&format!("Content-Length: {}\r\n", body.len()));
            response.push_str("\r\n");
            response.push_str(body);
        } else {
            response.push_str("\r\n");
        }
        response
    }
}

/// Encode a complete response in one call.
pub fn encode(
    status: StatusCode,
    cseq: &str,
    extra_headers: &[(&str, &str)],
    body: Option<&str>,
) -> Vec<u8> {
    let mut response = RtspResponse::new(status, cseq);
    for (name, value) in extra_headers {
        response = response.add_header(name, value);
    }
    if let Some(body) = body {
        response = response.with_body(body.to_string());
    }
    response.serialize().into_bytes()
}
