//! Error types for the RTSP signaling library.

use std::fmt;

/// Errors that can occur in the RTSP signaling library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Protocol**: [`Parse`](Self::Parse) for malformed RTSP messages,
///   [`BodyTooLarge`](Self::BodyTooLarge) for a `Content-Length` above the
///   configured limit.
/// - **SDP**: [`Sdp`](Self::Sdp) for a session description that could not be
///   parsed.
/// - **Transport**: [`Io`](Self::Io) for socket/network failures.
/// - **Session**: [`SessionNotFound`](Self::SessionNotFound).
/// - **Server**: [`NotStarted`](Self::NotStarted),
///   [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum RtspError {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No session with the given ID exists in the [`SessionRegistry`](crate::session::SessionRegistry).
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Failed to parse an RTSP request message (RFC 2326 §6).
    #[error("RTSP parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The request announced a body larger than the server accepts.
    #[error("request body of {length} bytes exceeds limit of {limit}")]
    BodyTooLarge { length: usize, limit: usize },

    /// Failed to parse an SDP session description (RFC 4566).
    #[error(transparent)]
    Sdp(#[from] SdpError),

    /// [`Server::local_addr`](crate::Server::local_addr) was queried before
    /// [`Server::start`](crate::Server::start).
    #[error("server not started")]
    NotStarted,

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,
}

impl RtspError {
    pub(crate) fn parse(kind: ParseErrorKind) -> Self {
        RtspError::Parse { kind }
    }
}

/// Specific kind of RTSP parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// Protocol version was not `NAME/major.minor` with numeric components.
    InvalidVersion,
    /// Status line did not have the expected `Version Code Reason` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// The request line or header section was not valid UTF-8.
    NotUtf8,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidVersion => write!(f, "invalid protocol version"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::NotUtf8 => write!(f, "header section is not UTF-8"),
        }
    }
}

/// Errors that abort SDP parsing.
///
/// The partially built descriptor is still returned alongside the error,
/// see [`SdpOutcome`](crate::protocol::sdp::SdpOutcome).
#[derive(Debug, thiserror::Error)]
pub enum SdpError {
    /// The text before `=` was not exactly one character.
    #[error("SDP only allows 1-character keys: {line:?}")]
    InvalidKey { line: String },

    /// `v=` did not carry an integer.
    #[error("invalid SDP version: {value:?}")]
    InvalidVersion { value: String },

    /// `c=` carried a TTL outside `0..65535`.
    #[error("invalid TTL in connection line: {value:?}")]
    InvalidTtl { value: String },

    /// The underlying reader failed.
    #[error("SDP read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for `Result<T, RtspError>`.
pub type Result<T> = std::result::Result<T, RtspError>;
