//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use vizsession_core::SessionContext;
use vizsession_loader::Caches;
use vizsession_publish::StagedPublisher;

/// State shared by every handler and socket.
pub struct AppState {
    /// Collaborators every session runs against.
    pub sessions: Arc<SessionContext>,
    /// Snapshot exporter.
    pub publisher: StagedPublisher,
    /// When the server started.
    pub started_at: DateTime<Utc>,
    connected: AtomicU64,
    opened: AtomicU64,
}

impl AppState {
    /// Create the state.
    pub fn new(sessions: Arc<SessionContext>, publisher: StagedPublisher) -> Self {
        Self {
            sessions,
            publisher,
            started_at: Utc::now(),
            connected: AtomicU64::new(0),
            opened: AtomicU64::new(0),
        }
    }

    /// The cache registry.
    pub fn caches(&self) -> &Arc<Caches> {
        self.sessions.caches()
    }

    /// Sockets currently open.
    pub fn connected(&self) -> u64 {
        self.connected.load(Ordering::Relaxed)
    }

    /// Sockets opened since start.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Count a socket for as long as the returned guard lives.
    pub fn track_connection(self: &Arc<Self>) -> ConnectionGuard {
        self.connected.fetch_add(1, Ordering::Relaxed);
        self.opened.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            state: Arc::clone(self),
        }
    }
}

/// Decrements the open socket count when dropped.
pub struct ConnectionGuard {
    state: Arc<AppState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.connected.fetch_sub(1, Ordering::Relaxed);
    }
}
