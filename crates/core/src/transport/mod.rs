//! Network transport for RTSP signaling.
//!
//! Each accepted TCP connection carries the request/response exchange of
//! one client and is served by its own thread ([`tcp`]). The
//! [`Transport`] trait is the seam between that socket and
//! [`Connection`](crate::connection::Connection): read, write, close and
//! the two endpoint addresses.
//!
//! Interleaved RTP (RFC 2326 §10.12) arriving on the same connection is
//! recognized by its `$` marker and dropped; no media path exists here.

pub mod tcp;

use std::io::{self, Read, Write};
use std::net::SocketAddr;

/// Bidirectional byte stream of one RTSP client.
pub trait Transport: Read + Write + Send {
    fn peer_addr(&self) -> io::Result<SocketAddr>;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Close both directions.
    fn shutdown(&mut self) -> io::Result<()>;
}
