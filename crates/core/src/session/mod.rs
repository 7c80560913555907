//! RTSP session registry (RFC 2326 §3, §12.37).
//!
//! An RTSP session is a server-side state object created by SETUP when the
//! client names no session, and released when the connection that owns it
//! goes away. It carries:
//!
//! - A unique session ID (8 uppercase hex digits from a random `u32`,
//!   returned in the `Session` header).
//! - The [`ConnectionId`] of the owning connection.
//!
//! ## Ownership
//!
//! The [`SessionRegistry`] is the only owner of sessions. Connections keep
//! just the session ID and look the session up again whenever they need
//! it, so there is no reference cycle between a connection and its
//! session. A session exists exactly as long as it is registered.
//!
//! A session belongs to the connection that created it
//! ([`Session::owner`]). Other connections may bind it by naming it in
//! SETUP, but only the owner removes it
//! ([`remove_owned`](SessionRegistry::remove_owned)), when its read loop ends.
//!
//! ## Locking
//!
//! One `parking_lot::Mutex` guards the whole map. It is held only for the
//! map operation itself, never across socket I/O, and callers must not
//! hold any per-connection lock while calling in.

use crate::error::{Result, RtspError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of one accepted RTSP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a process-unique connection ID.
    pub fn next() -> Self {
        ConnectionId(CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A single RTSP session (RFC 2326 §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Unique session identifier (8-char uppercase hex string).
    pub id: String,
    /// Connection that created the session.
    pub owner: ConnectionId,
    /// Remote address of the owning connection, when known.
    pub peer_addr: Option<SocketAddr>,
    pub created_at: Instant,
}

/// Format a random value as a session ID.
pub fn format_session_id(value: u32) -> String {
    format!("{:08X}", value)
}

type IdSource = Arc<dyn Fn() -> u32 + Send + Sync>;

/// Thread-safe registry of active sessions, shared by all connections.
///
/// Cloning is cheap and yields a handle to the same map.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, Session>>>,
    id_source: IdSource,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_id_source(rand::random::<u32>)
    }

    /// Registry drawing session ID values from `source` instead of the
    /// thread-local RNG.
    pub fn with_id_source<F>(source: F) -> Self
    where
        F: Fn() -> u32 + Send + Sync + 'static,
    {
        SessionRegistry {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            id_source: Arc::new(source),
        }
    }

    /// Create and register a session owned by `owner`.
    ///
    /// Draws random IDs until one is not in use.
    pub fn create(&self, owner: ConnectionId, peer_addr: Option<SocketAddr>) -> Session {
        let (session, total) = {
            let mut sessions = self.sessions.lock();
            let id = loop {
                let candidate = format_session_id((self.id_source)());
                if !sessions.contains_key(&candidate) {
                    break candidate;
                }
                tracing::trace!(session_id = %candidate, "session id collision, retrying");
            };

            let session = Session {
                id: id.clone(),
                owner,
                peer_addr,
                created_at: Instant::now(),
            };
            sessions.insert(id, session.clone());
            (session, sessions.len())
        };

        tracing::debug!(session_id = %session.id, %owner, total_sessions = total, "session created");
        session
    }

    /// Look up a session by ID.
    pub fn lookup(&self, id: &str) -> Option<Session> {
        self.sessions.lock().get(id).cloned()
    }

    /// Like [`lookup`](Self::lookup), but an unknown ID is an error.
    pub fn get(&self, id: &str) -> Result<Session> {
        self.lookup(id)
            .ok_or_else(|| RtspError::SessionNotFound(id.to_string()))
    }

    /// Remove a session only if `owner` is the connection that created it.
    pub fn remove_owned(&self, id: &str, owner: ConnectionId) -> Option<Session> {
        let (removed, total) = {
            let mut sessions = self.sessions.lock();
            let removed = match sessions.get(id) {
                Some(session) if session.owner == owner => sessions.remove(id),
                _ => None,
            };
            (removed, sessions.len())
        };
        if removed.is_some() {
            tracing::debug!(session_id = %id, %owner, total_sessions = total, "session removed");
        }
        removed
    }

    /// Remove a session by ID. Removing an absent ID is a no-op.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let (removed, total) = {
            let mut sessions = self.sessions.lock();
            let removed = sessions.remove(id);
            (removed, sessions.len())
        };
        if removed.is_some() {
            tracing::debug!(session_id = %id, total_sessions = total, "session removed");
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.len())
            .finish()
    }
}
