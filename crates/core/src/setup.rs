//! Per-track SETUP logic.
//!
//! Once SETUP has resolved or created a session, the handler hands the
//! track-level work to a [`TrackSetup`] implementation and maps its
//! [`SetupOutcome`] to 200, 404 or 461.

use crate::protocol::sdp::SessionDescriptor;
use crate::session::Session;

/// What per-track setup decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    Ready,
    /// No stream matches the requested path (404).
    StreamNotFound,
    /// The client asked for a transport the server cannot provide (461).
    UnsupportedTransport,
}

/// Inputs for one SETUP.
#[derive(Debug, Clone, Copy)]
pub struct SetupRequest<'a> {
    pub session: &'a Session,
    /// Request path before the last `/` (e.g. `live/cam`).
    pub path_prefix: &'a str,
    /// Last path segment (e.g. `trackID=1`).
    pub path_suffix: &'a str,
    /// Raw `Transport` header (RFC 2326 §12.39).
    pub transport: Option<&'a str>,
    /// Description most recently announced on this connection.
    pub announced: Option<&'a SessionDescriptor>,
}

pub trait TrackSetup: Send + Sync {
    fn setup(&self, request: &SetupRequest<'_>) -> SetupOutcome;
}

/// Setup policy used when none is configured.
///
/// - TCP interleaved transport (RFC 2326 §10.12) is refused; this server
///   has no RTP data path on the control connection.
/// - When a description was announced, the path suffix must name one of its
///   tracks through `a=control`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTrackSetup;

impl TrackSetup for DefaultTrackSetup {
    fn setup(&self, request: &SetupRequest<'_>) -> SetupOutcome {
        if let Some(transport) = request.transport
            && (transport.contains("RTP/AVP/TCP") || transport.contains("interleaved="))
        {
            tracing::warn!(transport, "client requested TCP interleaved transport");
            return SetupOutcome::UnsupportedTransport;
        }

        if let Some(descriptor) = request.announced {
            let suffix = request.path_suffix;
            let known = descriptor.streams.iter().any(|stream| {
                stream.track_name == suffix
                    || stream
                        .track_name
                        .strip_suffix(suffix)
                        .is_some_and(|head| head.ends_with('/'))
            });
            if !known {
                tracing::warn!(
                    prefix = request.path_prefix,
                    suffix,
                    "SETUP for track not in announced description"
                );
                return SetupOutcome::StreamNotFound;
            }
        }

        SetupOutcome::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::sdp;
    use crate::session::ConnectionId;
    use std::time::Instant;

    fn session() -> Session {
        Session {
            id: "0000ABCD".to_string(),
            owner: ConnectionId::next(),
            peer_addr: None,
            created_at: Instant::now(),
        }
    }

    fn request<'a>(
        session: &'a Session,
        suffix: &'a str,
        transport: Option<&'a str>,
        announced: Option<&'a SessionDescriptor>,
    ) -> SetupRequest<'a> {
        SetupRequest {
            session,
            path_prefix: "live",
            path_suffix: suffix,
            transport,
            announced,
        }
    }

    #[test]
    fn udp_without_announce_is_ready() {
        let s = session();
        let req = request(&s, "trackID=1", Some("RTP/AVP;unicast;client_port=8000-8001"), None);
        assert_eq!(DefaultTrackSetup.setup(&req), SetupOutcome::Ready);
    }

    #[test]
    fn interleaved_transport_is_unsupported() {
        let s = session();
        let req = request(&s, "trackID=1", Some("RTP/AVP/TCP;unicast;interleaved=0-1"), None);
        assert_eq!(DefaultTrackSetup.setup(&req), SetupOutcome::UnsupportedTransport);
    }

    #[test]
    fn announced_tracks_are_matched_by_control() {
        let descriptor = sdp::parse_str(
            "m=video 0 RTP/AVP 96\r\na=control:trackID=1\r\n\
             m=audio 0 RTP/AVP 97\r\na=control:rtsp://h/live/trackID=2\r\n",
        )
        .into_result()
        .unwrap();
        let s = session();

        let req = request(&s, "trackID=1", None, Some(&descriptor));
        assert_eq!(DefaultTrackSetup.setup(&req), SetupOutcome::Ready);
        let req = request(&s, "trackID=2", None, Some(&descriptor));
        assert_eq!(DefaultTrackSetup.setup(&req), SetupOutcome::Ready);
        let req = request(&s, "trackID=3", None, Some(&descriptor));
        assert_eq!(DefaultTrackSetup.setup(&req), SetupOutcome::StreamNotFound);
    }
}
