//! Torrent engine seam
//!
//! The session layer only ever talks to the engine through [`Engine`] and
//! [`EngineTorrent`]: resolve a source into a file set, read byte ranges of a
//! file while it downloads, sample transfer counters, destroy. The bundled
//! implementation is an actor-driven simulated swarm that materialises files
//! into the scratch root at a throttled rate.

pub mod actor;
pub mod commands;
pub mod content;
pub mod handle;
pub mod pending;
pub mod simulated;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::Serialize;

pub use actor::spawn_simulated_engine;
pub use handle::EngineHandle;
pub use pending::PendingTorrent;
pub use simulated::SimulatedTorrent;
#[cfg(any(test, feature = "test-utils"))]
pub use test_mocks::{MockEngine, MockFile, MockTorrent};

use crate::torrent::{InfoHash, MagnetLink, TorrentError, TorrentMetadata};

/// Chunked body of a file read. Dropping the stream cancels the read.
pub type ByteStream = BoxStream<'static, Result<Bytes, EngineError>>;

/// Where a torrent comes from.
#[derive(Debug, Clone)]
pub enum TorrentSource {
    /// Parsed magnet link; metadata still has to be found.
    Magnet(MagnetLink),
    /// Raw `.torrent` bytes, parsed by the engine.
    Descriptor(Bytes),
}

/// One file inside a resolved torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    /// Position in the torrent's file list
    pub index: usize,
    /// Final path component
    pub name: String,
    /// Path relative to the torrent's scratch directory
    pub path: String,
    /// Declared length in bytes, known before any data arrives
    pub length: u64,
}

impl FileHandle {
    /// Handles for every file of `metadata`, in torrent order.
    pub fn all(metadata: &TorrentMetadata) -> Vec<FileHandle> {
        metadata
            .files
            .iter()
            .enumerate()
            .map(|(index, file)| FileHandle {
                index,
                name: file.name().to_string(),
                path: file.relative_path(),
                length: file.length,
            })
            .collect()
    }
}

/// Point-in-time transfer counters for one torrent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    /// Bytes per second received
    pub download_rate: u64,
    /// Bytes per second sent
    pub upload_rate: u64,
    /// Fraction of bytes present, 0.0..=1.0
    pub progress: f64,
    pub peers: u32,
    pub seeds: Option<u32>,
    pub leechers: Option<u32>,
    /// Bytes present on disk
    pub downloaded: u64,
    /// Total declared bytes
    pub length: u64,
    /// Fraction of pieces fully present, 0.0..=1.0
    pub pieces_complete: f64,
}

/// Errors crossing the engine seam.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid torrent source: {0}")]
    InvalidSource(#[from] TorrentError),

    #[error("Metadata resolution failed: {reason}")]
    ResolveFailed { reason: String },

    #[error("Metadata resolution was cancelled")]
    ResolveCancelled,

    #[error("File {index} is not part of torrent {info_hash}")]
    UnknownFile { info_hash: InfoHash, index: usize },

    #[error("Read failed: {reason}")]
    ReadFailed { reason: String },

    #[error("Torrent {info_hash} was destroyed")]
    Destroyed { info_hash: InfoHash },

    #[error("Engine has shut down")]
    Shutdown,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A content-retrieval engine.
pub trait Engine: Send + Sync {
    /// Submits a source for resolution.
    ///
    /// The returned handle is the single suspension point of ingestion: it
    /// resolves once, to a ready torrent or an error, and can be cancelled.
    fn add(&self, source: TorrentSource) -> PendingTorrent;
}

/// A resolved torrent owned by exactly one session.
#[async_trait]
pub trait EngineTorrent: Send + Sync {
    fn info_hash(&self) -> InfoHash;

    fn name(&self) -> &str;

    /// Files in torrent order.
    fn files(&self) -> &[FileHandle];

    /// Directory this torrent writes into, if it writes to disk at all.
    fn scratch_dir(&self) -> Option<&Path>;

    /// Samples transfer counters. Never blocks.
    fn stats(&self) -> TransferStats;

    /// Opens a read of `file` over the inclusive range `[start, end]`.
    ///
    /// The stream waits for bytes that have not arrived yet and ends with an
    /// error if the torrent is destroyed first.
    ///
    /// # Errors
    /// - `EngineError::UnknownFile` - `file` does not belong to this torrent
    /// - `EngineError::ReadFailed` - Range lies outside the file
    fn read(&self, file: &FileHandle, start: u64, end: u64) -> Result<ByteStream, EngineError>;

    /// Stops all transfer activity and releases engine resources.
    ///
    /// Completes once the engine no longer touches the scratch directory.
    async fn destroy(&self) -> Result<(), EngineError>;
}

/// Checks a read request against the torrent's file list.
pub(crate) fn check_read(
    info_hash: InfoHash,
    files: &[FileHandle],
    file: &FileHandle,
    start: u64,
    end: u64,
) -> Result<(), EngineError> {
    if files.get(file.index) != Some(file) {
        return Err(EngineError::UnknownFile {
            info_hash,
            index: file.index,
        });
    }
    if start > end || end >= file.length {
        return Err(EngineError::ReadFailed {
            reason: format!(
                "range {start}-{end} outside {} ({} bytes)",
                file.name, file.length
            ),
        });
    }
    Ok(())
}
