//! SDP (Session Description Protocol) parsing (RFC 4566).
//!
//! Consumes the SDP body carried by ANNOUNCE. One record per line:
//!
//! ```text
//! v=0                                          ← protocol version
//! o=<user> <sess-id> <sess-ver> IN IP4 <addr>  ← origin
//! s=<session-name>                              ← session name
//! c=IN IP4 <addr>[/<ttl>]                       ← connection address
//! t=<ntp-start> <ntp-stop>                      ← timing
//! a=x-broadcastcontrol:RTSP                     ← session control type
//! m=video 0 RTP/AVP 96                          ← media description
//! a=rtpmap:96 H264/90000                        ← codec/clock rate
//! a=control:trackID=1                           ← track control URL
//! ```
//!
//! Parsing is stateful across lines:
//!
//! - A `c=` line before any `m=` line is held as a fallback and seeds the
//!   destination of the first media stream only. After an `m=` line it
//!   applies to that stream directly.
//! - `a=` lines before the first `m=` line are ignored, except
//!   `x-broadcastcontrol`, which sets the session control type anywhere.
//! - Track ids count up from 1 in `m=` order; `a=control:…=<digits>`
//!   replaces the counted id for its stream.

use std::io::BufRead;

use crate::error::SdpError;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970).
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

/// TTL used when a `c=` line does not carry one.
pub const DEFAULT_TTL: u16 = 15;

/// Buffer delay of a stream without an `a=x-bufferdelay` attribute.
pub const DEFAULT_BUFFER_DELAY_SECS: f32 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadType {
    #[default]
    Unknown,
    Audio,
    Video,
}

/// Who decides when an announced broadcast ends (`a=x-broadcastcontrol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControlType {
    /// Torn down together with the announcing RTSP session.
    Rtsp,
    /// Torn down at the end of the `t=` range.
    Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamTransport {
    #[default]
    Udp,
    /// `RTP/AVP/TCP`: media interleaved on the RTSP connection. Port and
    /// TTL carry no meaning for such a stream.
    TcpInterleaved,
}

/// One `m=` section of the description.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Source address of the content, empty when not known.
    pub src_ip: String,
    /// Destination address (the broadcast target).
    pub dest_ip: String,
    pub port: u16,
    pub ttl: u16,
    pub payload_type: PayloadType,
    /// Encoding name from `a=rtpmap`, e.g. `H264/90000`.
    pub payload_name: String,
    pub track_id: u32,
    /// Value of `a=control`.
    pub track_name: String,
    pub buffer_delay: f32,
    pub transport: StreamTransport,
    /// Set when a push to the server has been set up for this stream.
    pub setup_to_receive: bool,
}

impl Default for StreamInfo {
    fn default() -> Self {
        StreamInfo {
            src_ip: String::new(),
            dest_ip: String::new(),
            port: 0,
            ttl: 0,
            payload_type: PayloadType::Unknown,
            payload_name: String::new(),
            track_id: 0,
            track_name: String::new(),
            buffer_delay: DEFAULT_BUFFER_DELAY_SECS,
            transport: StreamTransport::Udp,
            setup_to_receive: false,
        }
    }
}

impl StreamInfo {
    pub fn is_tcp(&self) -> bool {
        self.transport == StreamTransport::TcpInterleaved
    }
}

/// Structured form of an SDP body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionDescriptor {
    pub version: u32,
    pub originator: String,
    pub session_name: String,
    pub session_information: String,
    pub uri: String,
    pub email: String,
    pub phone: String,
    pub connection_information: String,
    pub bandwidth_information: String,
    pub session_control: Option<SessionControlType>,
    pub start_time_unix_secs: u64,
    pub end_time_unix_secs: u64,
    /// True once a `t=` line was accepted, including `t=0 0`
    /// (present but unbounded).
    pub has_valid_time: bool,
    /// Explicit `a=x-bufferdelay` value, if any.
    pub buffer_delay: Option<f32>,
    /// One entry per `m=` line, in order.
    pub streams: Vec<StreamInfo>,
}

impl SessionDescriptor {
    /// `(start, end)` in Unix seconds; 0 means unbounded on that side.
    pub fn time_range(&self) -> Option<(u64, u64)> {
        self.has_valid_time
            .then_some((self.start_time_unix_secs, self.end_time_unix_secs))
    }

    /// Stream whose `a=control` value equals `control`.
    pub fn stream_by_control(&self, control: &str) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.track_name == control)
    }
}

/// How parsing stopped.
#[derive(Debug)]
pub enum SdpEnd {
    /// The input was consumed completely.
    Eof,
    /// A line could not be parsed, or the reader failed.
    Error(SdpError),
}

/// Result of [`parse`]: whatever was built before parsing stopped, and why
/// it stopped.
#[derive(Debug)]
pub struct SdpOutcome {
    pub descriptor: SessionDescriptor,
    pub end: SdpEnd,
}

impl SdpOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.end, SdpEnd::Eof)
    }

    /// Treat end of input as success and drop the partial descriptor on error.
    pub fn into_result(self) -> Result<SessionDescriptor, SdpError> {
        match self.end {
            SdpEnd::Eof => Ok(self.descriptor),
            SdpEnd::Error(e) => Err(e),
        }
    }
}

/// Parse an SDP description from a line-oriented reader.
///
/// Lines may end in CRLF or LF. Lines without `=` and unknown keys are
/// skipped.
pub fn parse<R: BufRead>(mut reader: R) -> SdpOutcome {
    let mut parser = Parser::new();
    let mut line = String::new();

    loop {
        line.clear();
        let end = match reader.read_line(&mut line) {
            Ok(0) => SdpEnd::Eof,
            Ok(_) => match parser.line(&line) {
                Ok(()) => continue,
                Err(e) => SdpEnd::Error(e),
            },
            Err(e) => SdpEnd::Error(SdpError::Io(e)),
        };

        return SdpOutcome {
            descriptor: parser.descriptor,
            end,
        };
    }
}

pub fn parse_str(text: &str) -> SdpOutcome {
    parse(text.as_bytes())
}

struct Parser {
    descriptor: SessionDescriptor,
    next_track_id: u32,
    /// Filled by a session-level `c=`; also carries the latest `a=x-bufferdelay`.
    global: StreamInfo,
    global_pending: bool,
}

impl Parser {
    fn new() -> Self {
        Parser {
            descriptor: SessionDescriptor::default(),
            next_track_id: 1,
            global: StreamInfo::default(),
            global_pending: false,
        }
    }

    fn line(&mut self, raw: &str) -> Result<(), SdpError> {
        let line = raw.trim_end_matches(['\r', '\n']);
        let Some((key, value)) = line.split_once('=') else {
            return Ok(());
        };
        if key.len() != 1 {
            return Err(SdpError::InvalidKey {
                line: line.to_string(),
            });
        }

        match key {
            "v" => {
                self.descriptor.version =
                    value.parse().map_err(|_| SdpError::InvalidVersion {
                        value: value.to_string(),
                    })?;
            }
            "o" => self.descriptor.originator = value.to_string(),
            "s" => self.descriptor.session_name = value.to_string(),
            "i" => self.descriptor.session_information = value.to_string(),
            "u" => self.descriptor.uri = value.to_string(),
            "e" => self.descriptor.email = value.to_string(),
            "p" => self.descriptor.phone = value.to_string(),
            "b" => self.descriptor.bandwidth_information = value.to_string(),
            "t" => self.time(value),
            "c" => self.connection(value)?,
            "m" => self.media(value),
            "a" => self.attribute(value),
            _ => {}
        }
        Ok(())
    }

    /// `t=<start> <stop>` in NTP seconds.
    fn time(&mut self, value: &str) {
        let mut rest = value;
        let ntp_start = next_integer(&mut rest).unwrap_or(0);
        let ntp_end = next_integer(&mut rest).unwrap_or(0);

        if ntp_start > 0 && ntp_end > 0 && ntp_start > ntp_end {
            tracing::debug!(ntp_start, ntp_end, "SDP time range ends before it starts; ignored");
            return;
        }

        // Start times before 1970 are accepted as unbounded.
        let start = if ntp_start != 0 && ntp_start >= NTP_UNIX_OFFSET {
            ntp_start - NTP_UNIX_OFFSET
        } else {
            0
        };

        if ntp_end != 0 && ntp_end < NTP_UNIX_OFFSET {
            tracing::debug!(ntp_end, "SDP stop time before 1970; ignored");
            return;
        }
        let end = if ntp_end != 0 {
            ntp_end - NTP_UNIX_OFFSET
        } else {
            0
        };

        self.descriptor.start_time_unix_secs = start;
        self.descriptor.end_time_unix_secs = end;
        self.descriptor.has_valid_time = true;
    }

    /// `c=IN IP4 <addr>[/<ttl>[/<count>]]`
    fn connection(&mut self, value: &str) -> Result<(), SdpError> {
        self.descriptor.connection_information = value.to_string();

        let Some(address) = value.strip_prefix("IN IP4 ") else {
            tracing::debug!(value, "SDP connection line without IN IP4 address");
            return Ok(());
        };

        let mut fields = address.trim().splitn(3, '/');
        let ip = fields.next().unwrap_or_default().to_string();
        let ttl = match fields.next() {
            Some(raw) => parse_ttl(raw)?,
            None => DEFAULT_TTL,
        };

        let target = match self.descriptor.streams.last_mut() {
            Some(stream) => stream,
            None => {
                self.global_pending = true;
                &mut self.global
            }
        };
        target.dest_ip = ip;
        target.ttl = ttl;
        Ok(())
    }

    /// `m=<media> <port> <proto> <fmt> ...`
    fn media(&mut self, value: &str) {
        let mut stream = StreamInfo {
            track_id: self.next_track_id,
            buffer_delay: self.global.buffer_delay,
            ..StreamInfo::default()
        };
        self.next_track_id += 1;

        if std::mem::take(&mut self.global_pending) {
            stream.dest_ip = self.global.dest_ip.clone();
            stream.ttl = self.global.ttl;
        }

        let mut tokens = value.split_whitespace();
        stream.payload_type = match tokens.next() {
            Some("audio") => PayloadType::Audio,
            Some("video") => PayloadType::Video,
            _ => PayloadType::Unknown,
        };

        let mut port_field = tokens.next().unwrap_or_default();
        if let Some(port) = next_integer(&mut port_field)
            && port > 0
            && port < 65536
        {
            stream.port = port as u16;
        }

        if tokens.next() == Some("RTP/AVP/TCP") {
            stream.transport = StreamTransport::TcpInterleaved;
        }

        self.descriptor.streams.push(stream);
    }

    /// `a=<name>[:<value>]`
    fn attribute(&mut self, value: &str) {
        let (name, rest) = value.split_once(':').unwrap_or((value, ""));

        if name == "x-broadcastcontrol" {
            match rest.trim() {
                "RTSP" => self.descriptor.session_control = Some(SessionControlType::Rtsp),
                "TIME" => self.descriptor.session_control = Some(SessionControlType::Time),
                other => tracing::debug!(value = other, "unknown broadcast control"),
            }
        }

        if self.descriptor.streams.is_empty() {
            return;
        }

        if name == "x-bufferdelay" {
            let mut digits = rest;
            if let Some(delay) = next_float(&mut digits) {
                self.global.buffer_delay = delay;
                self.descriptor.buffer_delay = Some(delay);
            }
            return;
        }

        let Some(stream) = self.descriptor.streams.last_mut() else {
            return;
        };
        match name {
            "rtpmap" => {
                // a=rtpmap:96 H264/90000; the first rtpmap of a stream wins.
                if stream.payload_name.is_empty()
                    && let Some((_, encoding)) = rest.split_once(' ')
                {
                    stream.payload_name = encoding.trim().to_string();
                }
            }
            "control" => {
                stream.track_name = rest.to_string();
                if let Some(id) = track_id_from_control(rest) {
                    stream.track_id = id;
                }
            }
            _ => {}
        }
    }
}

fn parse_ttl(raw: &str) -> Result<u16, SdpError> {
    let invalid = || SdpError::InvalidTtl {
        value: raw.to_string(),
    };
    let ttl: i64 = raw.trim().parse().map_err(|_| invalid())?;
    if !(0..65535).contains(&ttl) {
        return Err(invalid());
    }
    Ok(ttl as u16)
}

/// `trackID=3` -> 3. Only digits after an `=` count.
fn track_id_from_control(control: &str) -> Option<u32> {
    let (_, mut after) = control.split_once('=')?;
    next_integer(&mut after).and_then(|n| u32::try_from(n).ok())
}

/// Skip to the next run of ASCII digits and consume it.
fn next_integer(input: &mut &str) -> Option<u64> {
    let start = input.find(|c: char| c.is_ascii_digit())?;
    let rest = &input[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    *input = &rest[len..];
    rest[..len].parse().ok()
}

fn next_float(input: &mut &str) -> Option<f32> {
    let start = input.find(|c: char| c.is_ascii_digit())?;
    let rest = &input[start..];
    let len = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    *input = &rest[len..];
    rest[..len].parse().ok()
}
