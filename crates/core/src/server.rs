use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::{Result, RtspError};
use crate::session::SessionRegistry;
use crate::setup::{DefaultTrackSetup, TrackSetup};
use crate::transport::tcp;

/// Identity advertised in the `Server` header of OPTIONS responses
/// (RFC 2326 §12.36).
pub const SERVER_NAME: &str = "rtsp-signal";

/// How a request body that did not arrive with its headers is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyReadPolicy {
    /// At most one more read; whatever it yields is the body, even if short.
    #[default]
    OneShot,
    /// Keep reading until `Content-Length` bytes are in or the socket fails.
    UntilComplete,
}

/// Reply to an ANNOUNCE whose SDP body fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnnouncePolicy {
    /// 200 OK regardless; the failure is only logged. Lenient towards
    /// encoders that emit slightly broken SDP.
    #[default]
    AlwaysOk,
    /// 400 Bad Request.
    RejectMalformed,
}

/// Reply to DESCRIBE, PLAY, PAUSE, RECORD, REDIRECT, TEARDOWN and unknown
/// methods, none of which have a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnimplementedPolicy {
    /// Send nothing and wait for the next request.
    #[default]
    Silent,
    /// 501 Not Implemented.
    NotImplemented,
}

/// Server-level configuration used by connections and protocol handlers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Product token in the `Server` header.
    pub server_name: String,
    pub server_version: String,
    /// Size of each socket read. One request is decoded per read.
    pub read_buffer_size: usize,
    pub body_read: BodyReadPolicy,
    /// Largest `Content-Length` accepted; larger requests close the connection.
    pub max_body_size: usize,
    pub announce: AnnouncePolicy,
    pub unimplemented: UnimplementedPolicy,
}

impl ServerConfig {
    /// Value of the `Server` header: `<name> <version>`.
    pub fn server_header(&self) -> String {
        format!("{} {}", self.server_name, self.server_version)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_name: SERVER_NAME.to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            read_buffer_size: 50 * 1024,
            body_read: BodyReadPolicy::OneShot,
            max_body_size: 1024 * 1024,
            announce: AnnouncePolicy::AlwaysOk,
            unimplemented: UnimplementedPolicy::Silent,
        }
    }
}

/// High-level RTSP server orchestrator.
///
/// Owns the session registry and per-track setup logic and hands both to
/// every connection accepted by [`transport::tcp`](crate::transport::tcp).
pub struct Server {
    registry: SessionRegistry,
    running: Arc<AtomicBool>,
    bind_addr: String,
    local_addr: Option<SocketAddr>,
    track_setup: Arc<dyn TrackSetup>,
    config: Arc<ServerConfig>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    /// Create a server with custom protocol configuration.
    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        Self {
            registry: SessionRegistry::new(),
            running: Arc::new(AtomicBool::new(false)),
            bind_addr: bind_addr.to_string(),
            local_addr: None,
            track_setup: Arc::new(DefaultTrackSetup),
            config: Arc::new(config),
        }
    }

    /// Replace the per-track SETUP logic.
    pub fn with_track_setup(mut self, track_setup: Arc<dyn TrackSetup>) -> Self {
        self.track_setup = track_setup;
        self
    }

    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(RtspError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.local_addr = Some(local_addr);

        self.running.store(true, Ordering::SeqCst);

        let running = self.running.clone();
        let registry = self.registry.clone();
        let track_setup = self.track_setup.clone();
        let config = self.config.clone();

        tracing::info!(addr = %local_addr, "RTSP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, registry, track_setup, config, running);
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address the listener is bound to (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.local_addr.ok_or(RtspError::NotStarted)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Returns the server's protocol configuration.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }
}
