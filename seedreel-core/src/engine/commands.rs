//! Command definitions for the simulated engine actor.

use serde::Serialize;
use tokio::sync::oneshot;

use super::TorrentSource;
use super::pending::ResolutionResponder;
use crate::torrent::{InfoHash, TorrentMetadata};

/// Commands that can be sent to the engine actor.
///
/// Each command that expects an answer carries its own response channel, so
/// the actor never shares its catalog or torrent table behind a lock.
pub enum EngineCommand {
    /// Resolve a magnet link or descriptor into a running torrent.
    Add {
        source: TorrentSource,
        responder: ResolutionResponder,
    },
    /// Make metadata known so magnet links with its info hash resolve.
    RegisterMetadata {
        metadata: TorrentMetadata,
        responder: oneshot::Sender<InfoHash>,
    },
    /// Internal: metadata for a pending resolution became available.
    MetadataReady {
        metadata: TorrentMetadata,
        responder: ResolutionResponder,
    },
    /// Internal: a torrent was destroyed and leaves the live table.
    Forget { torrent_id: u64 },
    /// Get engine-wide counters.
    GetStats {
        responder: oneshot::Sender<EngineStats>,
    },
    /// Stop every torrent and exit the actor loop.
    Shutdown { responder: oneshot::Sender<()> },
}

/// Engine-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Torrents currently downloading or seeding
    pub active_torrents: usize,
    /// Metadata entries magnet links can resolve against
    pub known_metadata: usize,
    /// Magnet links still waiting for metadata
    pub waiting_magnets: usize,
}
