use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::connection::Connection;
use crate::server::ServerConfig;
use crate::session::SessionRegistry;
use crate::setup::TrackSetup;
use crate::transport::Transport;

impl Transport for TcpStream {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::local_addr(self)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Non-blocking TCP accept loop.
///
/// Checks the `running` flag between accepts with a 50ms poll interval
/// so that [`crate::server::Server::stop`] can terminate it promptly.
/// Every accepted socket is served on its own thread.
pub fn accept_loop(
    listener: TcpListener,
    registry: SessionRegistry,
    track_setup: Arc<dyn TrackSetup>,
    config: Arc<ServerConfig>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                if stream.set_nonblocking(false).is_err() {
                    continue;
                }
                let registry = registry.clone();
                let track_setup = track_setup.clone();
                let config = config.clone();
                let running = running.clone();
                thread::spawn(move || {
                    serve(stream, registry, track_setup, config, &running);
                });
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// Entry point of a connection thread.
fn serve(
    stream: TcpStream,
    registry: SessionRegistry,
    track_setup: Arc<dyn TrackSetup>,
    config: Arc<ServerConfig>,
    running: &AtomicBool,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => addr,
        Err(_) => return,
    };
    let local_addr = stream.local_addr().ok();

    tracing::info!(%peer_addr, ?local_addr, "client connected");

    let mut conn = Connection::new(stream, registry, config, track_setup);
    let reason = conn.run(running);

    tracing::info!(%peer_addr, %reason, "client disconnected");
}
