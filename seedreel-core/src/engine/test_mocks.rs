//! Mock engine for testing sessions and streaming without a swarm.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;

use super::content::fill_pattern;
use super::pending::{PendingTorrent, ResolutionResponder};
use super::{
    ByteStream, Engine, EngineError, EngineTorrent, FileHandle, TorrentSource, TransferStats,
    check_read,
};
use crate::torrent::{InfoHash, TorrentError};

const MOCK_CHUNK_SIZE: u64 = 16 * 1024;

/// File served by a [`MockTorrent`].
#[derive(Debug, Clone)]
pub struct MockFile {
    pub name: String,
    pub length: u64,
    /// Exact content; the deterministic pattern when `None`.
    pub data: Option<Bytes>,
}

impl MockFile {
    /// File of `length` pattern bytes.
    pub fn new(name: &str, length: u64) -> Self {
        Self {
            name: name.to_string(),
            length,
            data: None,
        }
    }

    /// File with exact content.
    pub fn with_data(name: &str, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.to_string(),
            length: data.len() as u64,
            data: Some(data),
        }
    }
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Resolve,
    Fail(String),
    Reject,
    Never,
}

/// Engine that resolves every source to a fixed file set.
pub struct MockEngine {
    info_hash: InfoHash,
    name: String,
    files: Vec<MockFile>,
    stats: TransferStats,
    scratch_root: Option<PathBuf>,
    behavior: MockBehavior,
    adds: Arc<AtomicUsize>,
    destroys: Arc<AtomicUsize>,
    parked: Mutex<Vec<ResolutionResponder>>,
}

impl MockEngine {
    /// Resolves to `files`, in order.
    pub fn new(files: Vec<MockFile>) -> Self {
        Self {
            info_hash: InfoHash::new([0xab; 20]),
            name: "mock".to_string(),
            files,
            stats: TransferStats {
                download_rate: 1_048_576,
                upload_rate: 65_536,
                progress: 0.25,
                peers: 7,
                seeds: Some(5),
                leechers: Some(2),
                downloaded: 0,
                length: 0,
                pieces_complete: 0.25,
            },
            scratch_root: None,
            behavior: MockBehavior::Resolve,
            adds: Arc::new(AtomicUsize::new(0)),
            destroys: Arc::new(AtomicUsize::new(0)),
            parked: Mutex::new(Vec::new()),
        }
    }

    /// Every resolution fails with `EngineError::ResolveFailed`.
    pub fn failing(reason: &str) -> Self {
        Self {
            behavior: MockBehavior::Fail(reason.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Every source is rejected as malformed.
    pub fn rejecting() -> Self {
        Self {
            behavior: MockBehavior::Reject,
            ..Self::new(Vec::new())
        }
    }

    /// Resolutions never complete until cancelled.
    pub fn never_resolving() -> Self {
        Self {
            behavior: MockBehavior::Never,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_info_hash(mut self, info_hash: InfoHash) -> Self {
        self.info_hash = info_hash;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_stats(mut self, stats: TransferStats) -> Self {
        self.stats = stats;
        self
    }

    /// Torrents get a real scratch directory at `root/<info hash>-<add count>`.
    pub fn with_scratch_root(mut self, root: &Path) -> Self {
        self.scratch_root = Some(root.to_path_buf());
        self
    }

    /// Number of `add` calls.
    pub fn adds(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    /// Number of torrents destroyed, counting each torrent once.
    pub fn destroys(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    /// Number of never-completing resolutions the caller gave up on.
    pub fn abandoned(&self) -> usize {
        self.parked
            .lock()
            .iter()
            .filter(|responder| responder.is_abandoned())
            .count()
    }

    fn torrent(&self) -> Result<MockTorrent, EngineError> {
        let scratch_dir = self
            .scratch_root
            .as_ref()
            .map(|root| root.join(format!("{}-{}", self.info_hash, self.adds())));
        if let Some(dir) = &scratch_dir {
            std::fs::create_dir_all(dir)?;
        }

        let total: u64 = self.files.iter().map(|file| file.length).sum();
        let stats = TransferStats {
            length: total,
            downloaded: (total as f64 * self.stats.progress) as u64,
            ..self.stats
        };

        Ok(MockTorrent {
            info_hash: self.info_hash,
            name: self.name.clone(),
            files: self
                .files
                .iter()
                .enumerate()
                .map(|(index, file)| FileHandle {
                    index,
                    name: file.name.clone(),
                    path: file.name.clone(),
                    length: file.length,
                })
                .collect(),
            data: self.files.iter().map(|file| file.data.clone()).collect(),
            stats,
            scratch_dir,
            destroyed: AtomicBool::new(false),
            destroys: self.destroys.clone(),
        })
    }
}

impl Engine for MockEngine {
    fn add(&self, _source: TorrentSource) -> PendingTorrent {
        self.adds.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Resolve => PendingTorrent::ready(
                self.torrent()
                    .map(|torrent| Arc::new(torrent) as Arc<dyn EngineTorrent>),
            ),
            MockBehavior::Fail(reason) => PendingTorrent::ready(Err(EngineError::ResolveFailed {
                reason: reason.clone(),
            })),
            MockBehavior::Reject => {
                PendingTorrent::ready(Err(EngineError::InvalidSource(
                    TorrentError::InvalidTorrentFile {
                        reason: "mock rejection".to_string(),
                    },
                )))
            }
            MockBehavior::Never => {
                let (responder, pending) = PendingTorrent::channel();
                self.parked.lock().push(responder);
                pending
            }
        }
    }
}

/// Torrent with every byte already present.
pub struct MockTorrent {
    info_hash: InfoHash,
    name: String,
    files: Vec<FileHandle>,
    data: Vec<Option<Bytes>>,
    stats: TransferStats,
    scratch_dir: Option<PathBuf>,
    destroyed: AtomicBool,
    destroys: Arc<AtomicUsize>,
}

#[async_trait]
impl EngineTorrent for MockTorrent {
    fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn files(&self) -> &[FileHandle] {
        &self.files
    }

    fn scratch_dir(&self) -> Option<&Path> {
        self.scratch_dir.as_deref()
    }

    fn stats(&self) -> TransferStats {
        self.stats
    }

    fn read(&self, file: &FileHandle, start: u64, end: u64) -> Result<ByteStream, EngineError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(EngineError::Destroyed {
                info_hash: self.info_hash,
            });
        }
        check_read(self.info_hash, &self.files, file, start, end)?;

        let data = self.data[file.index].clone();
        let file_index = file.index;
        let offsets = (start..=end).step_by(MOCK_CHUNK_SIZE as usize);

        Ok(stream::iter(offsets)
            .map(move |offset| {
                let chunk_end = (offset + MOCK_CHUNK_SIZE - 1).min(end);
                let chunk = match &data {
                    Some(data) => data.slice(offset as usize..=chunk_end as usize),
                    None => {
                        let mut buf = vec![0u8; (chunk_end - offset + 1) as usize];
                        fill_pattern(file_index, offset, &mut buf);
                        Bytes::from(buf)
                    }
                };
                Ok(chunk)
            })
            .boxed())
    }

    async fn destroy(&self) -> Result<(), EngineError> {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
