use crate::protocol::method::Method;
use crate::protocol::request::RtspRequest;
use crate::protocol::response::RtspResponse;
use crate::error::Result;
use crate::protocol::sdp::{self, SessionDescriptor};
use crate::protocol::status::StatusCode;
use crate::server::{AnnouncePolicy, ServerConfig, UnimplementedPolicy};
use crate::session::{ConnectionId, SessionRegistry};
use crate::setup::{SetupOutcome, SetupRequest, TrackSetup};
use std::net::SocketAddr;
use std::sync::Arc;

/// Which handler serves a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Options,
    Announce,
    Setup,
    /// GET_PARAMETER and SET_PARAMETER.
    Parameter,
    /// Recognized method without a handler. What the client gets back is
    /// decided by [`UnimplementedPolicy`].
    NotImplemented,
}

/// The routing table, total over the method vocabulary.
pub fn route(method: Method) -> Route {
    match method {
        Method::Options => Route::Options,
        Method::Announce => Route::Announce,
        Method::Setup => Route::Setup,
        Method::GetParameter | Method::SetParameter => Route::Parameter,
        Method::Describe
        | Method::Teardown
        | Method::Play
        | Method::Pause
        | Method::Record
        | Method::Redirect => Route::NotImplemented,
    }
}

/// Handles RTSP method requests for a single TCP connection.
///
/// Tracks which sessions were created on this connection, and which one is
/// currently bound. Sessions this connection created are released when it
/// drops; a bound session created elsewhere stays with its owner.
pub struct MethodHandler {
    registry: SessionRegistry,
    config: Arc<ServerConfig>,
    track_setup: Arc<dyn TrackSetup>,
    connection_id: ConnectionId,
    peer_addr: Option<SocketAddr>,
    /// Session bound by the last successful SETUP.
    bound_session: Option<String>,
    /// Session IDs created during this connection, for cleanup on disconnect.
    created_sessions: Vec<String>,
    /// Last description announced on this connection.
    announced: Option<SessionDescriptor>,
}

impl MethodHandler {
    pub fn new(
        registry: SessionRegistry,
        peer_addr: Option<SocketAddr>,
        config: Arc<ServerConfig>,
        track_setup: Arc<dyn TrackSetup>,
    ) -> Self {
        MethodHandler {
            registry,
            config,
            track_setup,
            connection_id: ConnectionId::next(),
            peer_addr,
            bound_session: None,
            created_sessions: Vec::new(),
            announced: None,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Session currently bound to this connection.
    pub fn bound_session(&self) -> Option<&str> {
        self.bound_session.as_deref()
    }

    pub fn announced(&self) -> Option<&SessionDescriptor> {
        self.announced.as_ref()
    }

    /// Build the response for `request`, or `None` when nothing is sent back.
    pub fn handle(&mut self, request: &RtspRequest) -> Option<RtspResponse> {
        let cseq = request.cseq().unwrap_or("0");

        let Some(method) = request.method() else {
            tracing::warn!(method = %request.method, %cseq, "unrecognized RTSP method");
            return self.not_implemented(cseq, &request.method);
        };

        match route(method) {
            Route::Options => Some(self.handle_options(cseq)),
            Route::Announce => Some(self.handle_announce(cseq, request)),
            Route::Setup => Some(self.handle_setup(cseq, request)),
            Route::Parameter => Some(self.handle_parameter(cseq, method, request)),
            Route::NotImplemented => self.not_implemented(cseq, method.as_str()),
        }
    }

    /// Remove the sessions this connection owns from the registry and unbind.
    pub fn release_sessions(&mut self) -> usize {
        self.bound_session = None;
        let released = std::mem::take(&mut self.created_sessions)
            .iter()
            .filter(|id| self.registry.remove_owned(id, self.connection_id).is_some())
            .count();
        if released > 0 {
            tracing::info!(connection = %self.connection_id, released, "released sessions");
        }
        released
    }

    fn handle_options(&self, cseq: &str) -> RtspResponse {
        tracing::debug!(%cseq, "OPTIONS");
        RtspResponse::ok(cseq)
            .add_header("Server", &self.config.server_header())
            .add_header("Public", &Method::public_header())
    }

    /// Parses the announced SDP. Whether a bad description still gets 200 OK
    /// is decided by [`AnnouncePolicy`].
    fn handle_announce(&mut self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        if request.content_length == 0 {
            tracing::debug!(%cseq, "ANNOUNCE without body");
            return RtspResponse::ok(cseq);
        }

        match parse_announced(request) {
            Ok(descriptor) => {
                tracing::info!(
                    %cseq,
                    uri = %request.uri,
                    streams = descriptor.streams.len(),
                    "description announced"
                );
                self.announced = Some(descriptor);
                RtspResponse::ok(cseq)
            }
            Err(e) => match self.config.announce {
                AnnouncePolicy::AlwaysOk => {
                    tracing::warn!(%cseq, error = %e, "ignoring malformed SDP in ANNOUNCE");
                    RtspResponse::ok(cseq)
                }
                AnnouncePolicy::RejectMalformed => {
                    tracing::warn!(%cseq, error = %e, "rejecting malformed SDP in ANNOUNCE");
                    RtspResponse::new(StatusCode::BAD_REQUEST, cseq)
                }
            },
        }
    }

    fn handle_setup(&mut self, cseq: &str, request: &RtspRequest) -> RtspResponse {
        let session = match request.session_id() {
            None => {
                let session = self.registry.create(self.connection_id, self.peer_addr);
                self.created_sessions.push(session.id.clone());
                tracing::info!(session_id = %session.id, uri = %request.uri, "session created via SETUP");
                session
            }
            Some(id) => match self.registry.get(id) {
                Ok(session) => session,
                Err(e) => {
                    tracing::warn!(error = %e, "SETUP for unknown session");
                    return RtspResponse::new(StatusCode::SESSION_NOT_FOUND, cseq);
                }
            },
        };
        self.bound_session = Some(session.id.clone());

        let (path_prefix, path_suffix) = request.path_components();
        let outcome = self.track_setup.setup(&SetupRequest {
            session: &session,
            path_prefix,
            path_suffix,
            transport: request.get_header("Transport"),
            announced: self.announced.as_ref(),
        });

        match outcome {
            SetupOutcome::Ready => {
                tracing::debug!(session_id = %session.id, path_prefix, path_suffix, "track set up");
                RtspResponse::ok(cseq).add_header("Session", &session.id)
            }
            SetupOutcome::StreamNotFound => {
                RtspResponse::new(StatusCode::STREAM_NOT_FOUND, cseq)
            }
            SetupOutcome::UnsupportedTransport => {
                RtspResponse::new(StatusCode::UNSUPPORTED_TRANSPORT, cseq)
            }
        }
    }

    /// GET_PARAMETER/SET_PARAMETER carry no parameters here; clients use them
    /// as a keepalive (RFC 2326 §10.8). `Session` is echoed only for the
    /// session bound to this connection.
    fn handle_parameter(&self, cseq: &str, method: Method, request: &RtspRequest) -> RtspResponse {
        tracing::trace!(%cseq, %method, "parameter keepalive");

        match request.session_id() {
            None => RtspResponse::ok(cseq),
            Some(id) if self.registry.contains(id) => {
                if self.bound_session.as_deref() == Some(id) {
                    RtspResponse::ok(cseq).add_header("Session", id)
                } else {
                    RtspResponse::ok(cseq)
                }
            }
            Some(id) => {
                tracing::warn!(session_id = id, %method, "unknown session");
                RtspResponse::new(StatusCode::SESSION_NOT_FOUND, cseq)
            }
        }
    }

    fn not_implemented(&self, cseq: &str, method: &str) -> Option<RtspResponse> {
        match self.config.unimplemented {
            UnimplementedPolicy::Silent => {
                tracing::debug!(method, %cseq, "no handler, sending no response");
                None
            }
            UnimplementedPolicy::NotImplemented => {
                Some(RtspResponse::new(StatusCode::NOT_IMPLEMENTED, cseq))
            }
        }
    }
}

/// Parse the SDP carried in an ANNOUNCE body.
fn parse_announced(request: &RtspRequest) -> Result<SessionDescriptor> {
    Ok(sdp::parse_str(&request.body_text()).into_result()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RtspError, SdpError};
    use crate::setup::DefaultTrackSetup;

    fn handler_with(config: ServerConfig, registry: &SessionRegistry) -> MethodHandler {
        MethodHandler::new(
            registry.clone(),
            None,
            Arc::new(config),
            Arc::new(DefaultTrackSetup),
        )
    }

    fn request(raw: &str) -> RtspRequest {
        RtspRequest::decode(raw.as_bytes()).unwrap().unwrap()
    }

    #[test]
    fn every_method_has_a_route() {
        let handled: Vec<_> = Method::ALL
            .into_iter()
            .filter(|m| route(*m) != Route::NotImplemented)
            .collect();
        assert_eq!(
            handled,
            vec![
                Method::Options,
                Method::Announce,
                Method::Setup,
                Method::GetParameter,
                Method::SetParameter
            ]
        );
    }

    #[test]
    fn options_advertises_server_and_public() {
        let registry = SessionRegistry::new();
        let mut handler = handler_with(ServerConfig::default(), &registry);
        let resp = handler
            .handle(&request("OPTIONS * RTSP/1.0\r\nCSeq: 11\r\n\r\n"))
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.get_header("CSeq"), Some("11"));
        assert!(resp.get_header("Server").unwrap().starts_with("rtsp-signal "));
        assert_eq!(resp.get_header("Public"), Some(Method::public_header().as_str()));
    }

    #[test]
    fn setup_without_session_creates_and_binds() {
        let registry = SessionRegistry::new();
        let mut handler = handler_with(ServerConfig::default(), &registry);
        let resp = handler
            .handle(&request(
                "SETUP rtsp://h/live/trackID=1 RTSP/1.0\r\nCSeq: 3\r\nTransport: RTP/AVP;unicast;client_port=8000-8001\r\n\r\n",
            ))
            .unwrap();

        assert_eq!(resp.status, StatusCode::OK);
        let id = resp.get_header("Session").unwrap().to_string();
        assert_eq!(handler.bound_session(), Some(id.as_str()));
        assert_eq!(
            registry.lookup(&id).unwrap().owner,
            handler.connection_id()
        );

        assert_eq!(handler.release_sessions(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn setup_with_existing_session_reuses_it() {
        let registry = SessionRegistry::new();
        let existing = registry.create(ConnectionId::next(), None);
        let mut handler = handler_with(ServerConfig::default(), &registry);

        let resp = handler
            .handle(&request(&format!(
                "SETUP rtsp://h/live/trackID=2 RTSP/1.0\r\nCSeq: 4\r\nSession: {};timeout=60\r\n\r\n",
                existing.id
            )))
            .unwrap();
        assert_eq!(resp.get_header("Session"), Some(existing.id.as_str()));
        assert_eq!(registry.len(), 1);
        assert_eq!(handler.bound_session(), Some(existing.id.as_str()));
    }

    #[test]
    fn unknown_session_is_454_and_registry_unchanged() {
        let registry = SessionRegistry::new();
        registry.create(ConnectionId::next(), None);
        let mut handler = handler_with(ServerConfig::default(), &registry);

        for method in ["SETUP", "GET_PARAMETER", "SET_PARAMETER"] {
            let resp = handler
                .handle(&request(&format!(
                    "{method} rtsp://h/live/trackID=1 RTSP/1.0\r\nCSeq: 5\r\nSession: 0BADF00D\r\n\r\n"
                )))
                .unwrap();
            assert_eq!(resp.status, StatusCode::SESSION_NOT_FOUND, "{method}");
            assert_eq!(resp.get_header("CSeq"), Some("5"));
            assert_eq!(resp.get_header("Session"), None);
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(handler.bound_session(), None);
    }

    #[test]
    fn parameter_keepalive_without_session_is_ok() {
        let registry = SessionRegistry::new();
        let mut handler = handler_with(ServerConfig::default(), &registry);
        let resp = handler
            .handle(&request("GET_PARAMETER rtsp://h/live RTSP/1.0\r\nCSeq: 8\r\n\r\n"))
            .unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.get_header("Session"), None);
    }

    #[test]
    fn setup_maps_track_outcomes_to_status() {
        let registry = SessionRegistry::new();
        let mut handler = handler_with(ServerConfig::default(), &registry);

        let resp = handler
            .handle(&request(
                "SETUP rtsp://h/live/trackID=1 RTSP/1.0\r\nCSeq: 6\r\nTransport: RTP/AVP/TCP;interleaved=0-1\r\n\r\n",
            ))
            .unwrap();
        assert_eq!(resp.status, StatusCode::UNSUPPORTED_TRANSPORT);

        let body = "v=0\r\nm=video 0 RTP/AVP 96\r\na=control:trackID=1\r\n";
        handler
            .handle(&request(&format!(
                "ANNOUNCE rtsp://h/live RTSP/1.0\r\nCSeq: 7\r\nContent-Length: {}\r\n\r\n{body}",
                body.len()
            )))
            .unwrap();
        assert_eq!(handler.announced().unwrap().streams.len(), 1);

        let resp = handler
            .handle(&request("SETUP rtsp://h/live/trackID=9 RTSP/1.0\r\nCSeq: 8\r\n\r\n"))
            .unwrap();
        assert_eq!(resp.status, StatusCode::STREAM_NOT_FOUND);

        // Both SETUPs created a session; both are released.
        assert_eq!(registry.len(), 2);
        assert_eq!(handler.release_sessions(), 2);
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_announce_follows_policy() {
        let body = "v=0\r\nxx=bad\r\n";
        let raw = format!(
            "ANNOUNCE rtsp://h/live RTSP/1.0\r\nCSeq: 9\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );
        let registry = SessionRegistry::new();

        let mut lenient = handler_with(ServerConfig::default(), &registry);
        let resp = lenient.handle(&request(&raw)).unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.headers.len(), 2, "only CSeq and Date");
        assert!(lenient.announced().is_none());

        let config = ServerConfig {
            announce: AnnouncePolicy::RejectMalformed,
            ..ServerConfig::default()
        };
        let mut strict = handler_with(config, &registry);
        let resp = strict.handle(&request(&raw)).unwrap();
        assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unimplemented_methods_follow_policy() {
        let registry = SessionRegistry::new();
        let mut silent = handler_with(ServerConfig::default(), &registry);
        for method in ["DESCRIBE", "PLAY", "PAUSE", "RECORD", "REDIRECT", "TEARDOWN", "FLUSH"] {
            let req = request(&format!("{method} rtsp://h/live RTSP/1.0\r\nCSeq: 1\r\n\r\n"));
            assert!(silent.handle(&req).is_none(), "{method}");
        }

        let config = ServerConfig {
            unimplemented: UnimplementedPolicy::NotImplemented,
            ..ServerConfig::default()
        };
        let mut loud = handler_with(config, &registry);
        let resp = loud
            .handle(&request("PLAY rtsp://h/live RTSP/1.0\r\nCSeq: 2\r\n\r\n"))
            .unwrap();
        assert_eq!(resp.status, StatusCode::NOT_IMPLEMENTED);
        assert_eq!(resp.get_header("CSeq"), Some("2"));
    }

    #[test]
    fn session_is_released_only_by_the_connection_that_created_it() {
        let registry = SessionRegistry::new();
        let mut a = handler_with(ServerConfig::default(), &registry);
        let mut b = handler_with(ServerConfig::default(), &registry);

        let resp = a
            .handle(&request("SETUP rtsp://h/live/trackID=1 RTSP/1.0\r\nCSeq: 1\r\n\r\n"))
            .unwrap();
        let id = resp.get_header("Session").unwrap().to_string();

        let resp = b
            .handle(&request(&format!(
                "SETUP rtsp://h/live/trackID=1 RTSP/1.0\r\nCSeq: 1\r\nSession: {id}\r\n\r\n"
            )))
            .unwrap();
        assert_eq!(resp.get_header("Session"), Some(id.as_str()));
        assert_eq!(b.bound_session(), Some(id.as_str()));
        assert_eq!(registry.lookup(&id).unwrap().owner, a.connection_id());

        assert_eq!(b.release_sessions(), 0);
        assert_eq!(b.bound_session(), None);
        assert!(registry.contains(&id));

        assert_eq!(a.release_sessions(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn keepalive_echoes_only_the_bound_session() {
        let registry = SessionRegistry::new();
        let foreign = registry.create(ConnectionId::next(), None);
        let mut handler = handler_with(ServerConfig::default(), &registry);

        let keepalive = |id: &str| {
            request(&format!(
                "GET_PARAMETER rtsp://h/live RTSP/1.0\r\nCSeq: 2\r\nSession: {id}\r\n\r\n"
            ))
        };

        let resp = handler.handle(&keepalive(&foreign.id)).unwrap();
        assert_eq!(resp.status, StatusCode::OK);
        assert_eq!(resp.get_header("Session"), None);

        let resp = handler
            .handle(&request("SETUP rtsp://h/live/trackID=1 RTSP/1.0\r\nCSeq: 3\r\n\r\n"))
            .unwrap();
        let bound = resp.get_header("Session").unwrap().to_string();
        let resp = handler.handle(&keepalive(&bound)).unwrap();
        assert_eq!(resp.get_header("Session"), Some(bound.as_str()));
    }

    #[test]
    fn announce_parse_failure_is_an_sdp_error() {
        let body = "v=zero\r\n";
        let req = request(&format!(
            "ANNOUNCE rtsp://h/live RTSP/1.0\r\nCSeq: 1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        assert!(matches!(
            parse_announced(&req),
            Err(RtspError::Sdp(SdpError::InvalidVersion { .. }))
        ));
    }
}
