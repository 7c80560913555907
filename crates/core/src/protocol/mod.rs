//! RTSP signaling (RFC 2326) for publishing clients.
//!
//! Requests are decoded one per socket read ([`request`]), routed by method
//! ([`handler`]) and answered with a response whose first headers are always
//! `CSeq` and `Date` ([`response`]). Announced media descriptions are parsed
//! by [`sdp`].
//!
//! ## Handled methods
//!
//! | Method | RFC section | Reply |
//! |--------|-------------|-------|
//! | OPTIONS | §10.1 | 200 with `Server` and `Public` |
//! | ANNOUNCE | §10.3 | 200 (SDP stored for later SETUPs) |
//! | SETUP | §10.4 | 200 with `Session`, or 404 / 454 / 461 |
//! | GET_PARAMETER | §10.8 | 200 keepalive, or 454 |
//! | SET_PARAMETER | §10.9 | 200 keepalive, or 454 |
//!
//! DESCRIBE, PLAY, PAUSE, RECORD, REDIRECT and TEARDOWN are recognized but
//! have no handler; see [`UnimplementedPolicy`](crate::server::UnimplementedPolicy).

pub mod handler;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;
pub mod sdp;
pub mod status;

pub use handler::{MethodHandler, Route};
pub use headers::HeaderMap;
pub use method::Method;
pub use request::RtspRequest;
pub use response::RtspResponse;
pub use sdp::SessionDescriptor;
pub use status::StatusCode;
