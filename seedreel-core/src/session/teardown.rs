//! Retiring sessions: exactly once, awaitable by everyone who asks.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::SessionError;
use super::manager::SessionManager;
use super::registry::{DrainTicket, Release};
use super::types::Session;
use crate::engine::EngineTorrent;

impl SessionManager {
    /// Retires session `id` regardless of how many connections hold it.
    ///
    /// The first caller does the work; concurrent callers wait for it to
    /// finish. Unknown ids return immediately.
    pub async fn teardown(&self, id: &str) {
        match self.registry.begin_draining(id) {
            DrainTicket::Started(session) => self.retire(session).await,
            DrainTicket::InProgress(session) => session.closed().await,
            DrainTicket::Missing => debug!("Teardown of unknown session {}", id),
        }
    }

    /// Drops one connection's hold on session `id`, retiring it when no
    /// holder remains.
    ///
    /// Returns once the session is closed or still held by someone else.
    pub async fn release(&self, id: &str) {
        match self.registry.release(id) {
            Release::Drain(session) => self.retire(session).await,
            Release::InProgress(session) => session.closed().await,
            Release::Retained => debug!("Session {} still held", id),
            Release::Missing => debug!("Release of unknown session {}", id),
        }
    }

    /// Retires every session.
    pub async fn shutdown(&self) {
        let ids = self.registry.ids();
        if !ids.is_empty() {
            info!("Closing {} sessions", ids.len());
        }
        join_all(ids.iter().map(|id| self.teardown(id))).await;
    }

    async fn retire(&self, session: Arc<Session>) {
        debug!("Retiring session {}", session.id());
        session.stop_telemetry();
        self.dispose(session.torrent()).await;
        self.registry.remove(session.id());
        info!(
            "Session {} closed after {}s",
            session.id(),
            session.uptime().num_seconds()
        );
    }

    /// Destroys `torrent` and deletes what it left on disk.
    pub(super) async fn dispose(&self, torrent: &Arc<dyn EngineTorrent>) {
        if let Err(e) = torrent.destroy().await {
            warn!("Destroying torrent {} failed: {}", torrent.info_hash(), e);
        }

        let Some(scratch_dir) = torrent.scratch_dir() else {
            return;
        };

        // Open handles may linger briefly after destroy.
        tokio::time::sleep(self.config.cleanup_delay).await;

        if let Err(e) = remove_scratch_dir(scratch_dir).await {
            warn!("{}", e);
        }
        if let Some(root) = scratch_dir.parent()
            && let Err(e) = remove_scratch_root(root).await
        {
            warn!("{}", e);
        }
    }
}

/// Deletes one torrent's scratch directory. A missing directory counts as
/// removed.
///
/// # Errors
/// - `SessionError::CleanupFailure` - Directory exists but could not be deleted
pub(crate) async fn remove_scratch_dir(path: &Path) -> Result<(), SessionError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!("Removed scratch directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::CleanupFailure {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Deletes the shared scratch root if no torrent directory is left in it.
///
/// A root that is already gone or still in use is left alone.
///
/// # Errors
/// - `SessionError::CleanupFailure` - Root could not be deleted for another reason
pub(crate) async fn remove_scratch_root(root: &Path) -> Result<(), SessionError> {
    match tokio::fs::remove_dir(root).await {
        Ok(()) => {
            debug!("Removed scratch root {}", root.display());
            Ok(())
        }
        // Another session may have removed the root or created a directory in it.
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::DirectoryNotEmpty) => {
            debug!("Scratch root {} kept: {}", root.display(), e);
            Ok(())
        }
        Err(e) => Err(SessionError::CleanupFailure {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}
