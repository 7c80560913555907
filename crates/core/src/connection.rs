//! One RTSP client connection: read → decode → route → respond.
//!
//! Strictly one request in flight. Each loop iteration performs one read,
//! decodes one request from it, lets the [`MethodHandler`] build the
//! response and writes it back in full before reading again, so responses
//! leave in request order.
//!
//! A body that did not arrive together with its headers gets more reads
//! according to [`BodyReadPolicy`]: exactly one for `OneShot` (a body still
//! short after that is used truncated), as many as needed for
//! `UntilComplete`.
//!
//! The loop ends on end-of-stream, a read or write error, or a malformed
//! request. Sessions owned by the connection are then released from the
//! registry and the transport is shut down.

use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::RtspError;
use crate::protocol::MethodHandler;
use crate::protocol::RtspRequest;
use crate::server::{BodyReadPolicy, ServerConfig};
use crate::session::SessionRegistry;
use crate::setup::TrackSetup;
use crate::transport::Transport;

/// Why a connection stopped serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// End of stream from the client.
    Closed,
    ReadError,
    WriteError,
    /// The request could not be decoded; closed without a response.
    Malformed,
    /// `Content-Length` above [`ServerConfig::max_body_size`].
    BodyTooLarge,
    Shutdown,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::Closed => "connection closed by client",
            ExitReason::ReadError => "read error",
            ExitReason::WriteError => "write error",
            ExitReason::Malformed => "malformed request",
            ExitReason::BodyTooLarge => "request body too large",
            ExitReason::Shutdown => "server shutting down",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single RTSP client connection with its own lifecycle.
pub struct Connection<T: Transport> {
    transport: T,
    handler: MethodHandler,
    config: Arc<ServerConfig>,
    buf: Vec<u8>,
    peer: String,
}

impl<T: Transport> Connection<T> {
    pub fn new(
        transport: T,
        registry: SessionRegistry,
        config: Arc<ServerConfig>,
        track_setup: Arc<dyn TrackSetup>,
    ) -> Self {
        let peer_addr = transport.peer_addr().ok();
        let peer = peer_addr
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let handler = MethodHandler::new(registry, peer_addr, config.clone(), track_setup);

        Connection {
            transport,
            handler,
            buf: vec![0; config.read_buffer_size.max(1)],
            config,
            peer,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn handler(&self) -> &MethodHandler {
        &self.handler
    }

    /// Serve requests until the connection ends, then release its sessions
    /// and close the transport.
    pub fn run(&mut self, running: &AtomicBool) -> ExitReason {
        let reason = self.serve(running);

        self.handler.release_sessions();
        if let Err(e) = self.transport.shutdown() {
            tracing::trace!(peer = %self.peer, error = %e, "transport shutdown");
        }
        reason
    }

    fn serve(&mut self, running: &AtomicBool) -> ExitReason {
        while running.load(Ordering::SeqCst) {
            let n = match self.read() {
                Ok(n) => n,
                Err(reason) => return reason,
            };

            let mut request = match RtspRequest::decode(&self.buf[..n]) {
                Ok(Some(request)) => request,
                Ok(None) => {
                    tracing::trace!(peer = %self.peer, bytes = n, "interleaved frame discarded");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer, error = %e, "parse error");
                    return ExitReason::Malformed;
                }
            };

            if request.content_length > self.config.max_body_size {
                let e = RtspError::BodyTooLarge {
                    length: request.content_length,
                    limit: self.config.max_body_size,
                };
                tracing::warn!(peer = %self.peer, error = %e, "rejecting request");
                return ExitReason::BodyTooLarge;
            }

            if request.missing_body_len() > 0
                && let Err(reason) = self.fill_body(&mut request)
            {
                return reason;
            }

            tracing::debug!(
                peer = %self.peer,
                method = %request.method,
                uri = %request.uri,
                cseq = request.cseq().unwrap_or(""),
                "request"
            );

            let Some(response) = self.handler.handle(&request) else {
                continue;
            };

            tracing::debug!(
                peer = %self.peer,
                status = response.status_code(),
                "response"
            );

            if let Err(e) = self.transport.write_all(response.serialize().as_bytes()) {
                tracing::warn!(peer = %self.peer, error = %e, "failed to send response");
                return ExitReason::WriteError;
            }
        }

        ExitReason::Shutdown
    }

    /// Read the rest of a body announced by `Content-Length`.
    fn fill_body(&mut self, request: &mut RtspRequest) -> Result<(), ExitReason> {
        loop {
            let n = self.read()?;
            request.append_body(&self.buf[..n]);

            let missing = request.missing_body_len();
            if missing == 0 {
                return Ok(());
            }
            if self.config.body_read == BodyReadPolicy::OneShot {
                tracing::warn!(
                    peer = %self.peer,
                    content_length = request.content_length,
                    missing,
                    "body still short after supplemental read; using it truncated"
                );
                return Ok(());
            }
        }
    }

    fn read(&mut self) -> Result<usize, ExitReason> {
        loop {
            match self.transport.read(&mut self.buf) {
                Ok(0) => return Err(ExitReason::Closed),
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "read failed");
                    return Err(ExitReason::ReadError);
                }
            }
        }
    }
}
