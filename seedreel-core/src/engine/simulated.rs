//! Simulated torrent: a throttled sequential download into scratch storage.
//!
//! Each file is written front to back. After every chunk the writer publishes
//! the new available length on a per-file `watch` channel, which is what a
//! reader ahead of the download waits on.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::EngineCommand;
use super::content::ContentSource;
use super::{ByteStream, EngineError, EngineTorrent, FileHandle, TransferStats, check_read};
use crate::config::EngineConfig;
use crate::torrent::{InfoHash, TorrentError, TorrentMetadata, is_safe_path_component};

const RATE_WINDOW: Duration = Duration::from_millis(500);

/// Torrent downloaded by the simulated swarm.
pub struct SimulatedTorrent {
    id: u64,
    metadata: TorrentMetadata,
    files: Vec<FileHandle>,
    scratch_dir: PathBuf,
    progress: Arc<SwarmProgress>,
    simulated_peers: u32,
    chunk_size: usize,
    cancel: CancellationToken,
    download: Mutex<Option<JoinHandle<()>>>,
    engine: mpsc::UnboundedSender<EngineCommand>,
}

impl SimulatedTorrent {
    /// Lays out the scratch directory and starts downloading.
    ///
    /// # Errors
    /// - `EngineError::InvalidSource` - A file path would leave the scratch
    ///   directory
    /// - `EngineError::Io` - Scratch directory could not be created
    pub(crate) async fn start(
        id: u64,
        metadata: TorrentMetadata,
        config: &EngineConfig,
        engine: mpsc::UnboundedSender<EngineCommand>,
    ) -> Result<Arc<Self>, EngineError> {
        if let Some(file) = metadata.files.iter().find(|file| {
            file.path.is_empty() || !file.path.iter().all(|c| is_safe_path_component(c))
        }) {
            return Err(TorrentError::InvalidTorrentFile {
                reason: format!("Unsafe file path: {:?}", file.path),
            }
            .into());
        }

        let scratch_dir = config
            .scratch_root
            .join(format!("{}-{}", metadata.info_hash, id));
        let files = FileHandle::all(&metadata);

        create_scratch_dir(&scratch_dir).await?;
        for file in &files {
            if let Some(parent) = scratch_dir.join(&file.path).parent() {
                create_scratch_dir(parent).await?;
            }
        }

        let progress = Arc::new(SwarmProgress::new(files.len()));
        let cancel = CancellationToken::new();
        let chunk_size = config.chunk_size.max(1);

        let job = DownloadJob {
            name: metadata.name.clone(),
            files: files.clone(),
            scratch_dir: scratch_dir.clone(),
            seed_dir: config.seed_dir.clone(),
            rate: config.download_rate,
            chunk_size,
            progress: progress.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(job.run());

        Ok(Arc::new(Self {
            id,
            metadata,
            files,
            scratch_dir,
            progress,
            simulated_peers: config.simulated_peers,
            chunk_size,
            cancel,
            download: Mutex::new(Some(task)),
            engine,
        }))
    }

    /// Stops transfers without waiting. Used when the engine shuts down.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// True once every file is fully written.
    pub fn is_complete(&self) -> bool {
        self.progress.finished.load(Ordering::Acquire)
    }

    fn pieces_complete(&self, downloaded: u64) -> f64 {
        let piece_count = self.metadata.piece_count;
        if piece_count == 0 {
            return 1.0;
        }
        let complete = if self.is_complete() {
            piece_count
        } else {
            let piece_length = u64::from(self.metadata.piece_length.max(1));
            (downloaded / piece_length).min(u64::from(piece_count)) as u32
        };
        f64::from(complete) / f64::from(piece_count)
    }
}

#[async_trait]
impl EngineTorrent for SimulatedTorrent {
    fn info_hash(&self) -> InfoHash {
        self.metadata.info_hash
    }

    fn name(&self) -> &str {
        &self.metadata.name
    }

    fn files(&self) -> &[FileHandle] {
        &self.files
    }

    fn scratch_dir(&self) -> Option<&Path> {
        Some(&self.scratch_dir)
    }

    fn stats(&self) -> TransferStats {
        let downloaded = self.progress.downloaded.load(Ordering::Relaxed);
        let length = self.metadata.total_length;
        let progress = if length == 0 {
            1.0
        } else {
            (downloaded as f64 / length as f64).min(1.0)
        };
        let download_rate = if self.is_complete() {
            0
        } else {
            self.progress.rate.load(Ordering::Relaxed)
        };

        let peers = self.simulated_peers;
        let leechers = peers / 3;

        TransferStats {
            download_rate,
            upload_rate: download_rate / 8,
            progress,
            peers,
            seeds: Some(peers - leechers),
            leechers: Some(leechers),
            downloaded,
            length,
            pieces_complete: self.pieces_complete(downloaded),
        }
    }

    fn read(&self, file: &FileHandle, start: u64, end: u64) -> Result<ByteStream, EngineError> {
        check_read(self.info_hash(), &self.files, file, start, end)?;

        let cursor = ReadCursor {
            info_hash: self.info_hash(),
            path: self.scratch_dir.join(&file.path),
            file: None,
            available: self.progress.available[file.index].subscribe(),
            cancel: self.cancel.clone(),
            position: start,
            end,
            chunk_size: self.chunk_size,
        };

        Ok(stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.position > cursor.end {
                return Ok(None);
            }
            let chunk = cursor.next_chunk().await?;
            Ok(Some((chunk, cursor)))
        })
        .boxed())
    }

    async fn destroy(&self) -> Result<(), EngineError> {
        self.cancel.cancel();

        let task = self.download.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            warn!("Download task of {} ended abnormally: {}", self.info_hash(), e);
        }

        let _ = self.engine.send(EngineCommand::Forget {
            torrent_id: self.id,
        });
        info!("Destroyed torrent #{} {}", self.id, self.info_hash());
        Ok(())
    }
}

/// Counters shared between the download task and stat sampling.
struct SwarmProgress {
    available: Vec<watch::Sender<u64>>,
    downloaded: AtomicU64,
    rate: AtomicU64,
    finished: AtomicBool,
    window: Mutex<RateWindow>,
}

struct RateWindow {
    started: Instant,
    bytes: u64,
}

impl SwarmProgress {
    fn new(file_count: usize) -> Self {
        Self {
            available: (0..file_count).map(|_| watch::Sender::new(0)).collect(),
            downloaded: AtomicU64::new(0),
            rate: AtomicU64::new(0),
            finished: AtomicBool::new(false),
            window: Mutex::new(RateWindow {
                started: Instant::now(),
                bytes: 0,
            }),
        }
    }

    fn record(&self, file_index: usize, available: u64, written: u64) {
        self.downloaded.fetch_add(written, Ordering::Relaxed);
        self.available[file_index].send_replace(available);

        let mut window = self.window.lock();
        window.bytes += written;
        let elapsed = window.started.elapsed();
        if elapsed >= RATE_WINDOW {
            let rate = (window.bytes as f64 / elapsed.as_secs_f64()) as u64;
            self.rate.store(rate, Ordering::Relaxed);
            window.bytes = 0;
            window.started = Instant::now();
        }
    }
}

/// Creates `path` and its parents.
///
/// An idle session may remove the empty shared root between the steps of
/// `create_dir_all`, so a vanished parent is retried.
async fn create_scratch_dir(path: &Path) -> std::io::Result<()> {
    let mut attempts = 0;
    loop {
        match tokio::fs::create_dir_all(path).await {
            Err(e) if e.kind() == ErrorKind::NotFound && attempts < 3 => {
                attempts += 1;
                debug!("Scratch parent of {} vanished, retrying", path.display());
            }
            result => return result,
        }
    }
}

struct DownloadJob {
    name: String,
    files: Vec<FileHandle>,
    scratch_dir: PathBuf,
    seed_dir: Option<PathBuf>,
    /// Bytes per second, 0 for unthrottled
    rate: u64,
    chunk_size: usize,
    progress: Arc<SwarmProgress>,
    cancel: CancellationToken,
}

impl DownloadJob {
    async fn run(self) {
        let started = Instant::now();

        for file in &self.files {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Download of {} cancelled", self.name);
                    return;
                }
                result = self.download_file(file) => {
                    if let Err(e) = result {
                        warn!("Download of {} failed: {}", file.path, e);
                        return;
                    }
                }
            }
        }

        self.progress.rate.store(0, Ordering::Relaxed);
        self.progress.finished.store(true, Ordering::Release);
        info!(
            "Torrent {} complete in {:.1}s",
            self.name,
            started.elapsed().as_secs_f64()
        );
    }

    async fn download_file(&self, file: &FileHandle) -> std::io::Result<()> {
        let mut out = File::create(self.scratch_dir.join(&file.path)).await?;
        let mut source = ContentSource::open(self.seed_dir.as_deref(), &self.name, file).await;
        let mut buf = vec![0u8; self.chunk_size];
        let mut offset = 0u64;

        while offset < file.length {
            let len = (file.length - offset).min(self.chunk_size as u64) as usize;
            source.read_at(offset, &mut buf[..len]).await?;
            out.write_all(&buf[..len]).await?;
            out.flush().await?;

            offset += len as u64;
            self.progress.record(file.index, offset, len as u64);

            if self.rate > 0 {
                tokio::time::sleep(Duration::from_secs_f64(len as f64 / self.rate as f64)).await;
            } else {
                tokio::task::yield_now().await;
            }
        }
        Ok(())
    }
}

/// Sequential reader over `[position, end]` of one file.
struct ReadCursor {
    info_hash: InfoHash,
    path: PathBuf,
    file: Option<File>,
    available: watch::Receiver<u64>,
    cancel: CancellationToken,
    position: u64,
    end: u64,
    chunk_size: usize,
}

impl ReadCursor {
    async fn next_chunk(&mut self) -> Result<Bytes, EngineError> {
        let position = self.position;
        let available = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(EngineError::Destroyed { info_hash: self.info_hash });
            }
            ready = self.available.wait_for(|len| *len > position) => match ready {
                Ok(len) => *len,
                Err(_) => return Err(EngineError::Destroyed { info_hash: self.info_hash }),
            },
        };

        let mut file = match self.file.take() {
            Some(file) => file,
            None => {
                let mut opened = File::open(&self.path).await?;
                opened.seek(SeekFrom::Start(position)).await?;
                opened
            }
        };

        let want = ((self.end + 1).min(available) - position).min(self.chunk_size as u64) as usize;
        let mut buf = vec![0u8; want];
        file.read_exact(&mut buf).await?;
        self.file = Some(file);
        self.position += want as u64;

        Ok(Bytes::from(buf))
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::engine::content::fill_pattern;
    use crate::engine::{Engine, TorrentSource, spawn_simulated_engine};
    use crate::torrent::MagnetParser;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    fn magnet(name: &str, length: u64) -> TorrentSource {
        let link = format!("magnet:?xt=urn:btih:{HASH}&dn={name}&xl={length}");
        TorrentSource::Magnet(MagnetParser::parse_magnet_link(&link).unwrap())
    }

    async fn collect(stream: ByteStream) -> Vec<u8> {
        let chunks: Vec<Bytes> = stream.try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_magnet_with_name_and_length_resolves_single_file() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            scratch_root: scratch.path().to_path_buf(),
            download_rate: 0,
            chunk_size: 1024,
            metadata_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let torrent = engine.add(magnet("movie.mp4", 10_000)).await.unwrap();
        assert_eq!(torrent.name(), "movie.mp4");
        assert_eq!(torrent.files().len(), 1);
        assert_eq!(torrent.files()[0].length, 10_000);
        let scratch_dir = torrent.scratch_dir().unwrap();
        assert_eq!(scratch_dir.parent().unwrap(), scratch.path());
        assert!(scratch_dir.file_name().unwrap().to_str().unwrap().starts_with(HASH));

        let file = torrent.files()[0].clone();
        let body = collect(torrent.read(&file, 100, 2_099).unwrap()).await;
        let mut expected = vec![0u8; 2_000];
        fill_pattern(0, 100, &mut expected);
        assert_eq!(body, expected);

        torrent.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsafe_file_path_is_not_laid_out() {
        let root = tempfile::tempdir().unwrap();
        let scratch_root = root.path().join("scratch");
        let config = EngineConfig {
            scratch_root: scratch_root.clone(),
            ..EngineConfig::default()
        };
        let (engine, _commands) = mpsc::unbounded_channel();
        let hash = InfoHash::from_hex(HASH).unwrap();

        for name in ["../escaped.mp4", "/tmp/escaped.mp4", ".."] {
            let metadata = TorrentMetadata::single_file(hash, name, 64, 16384);
            let result = SimulatedTorrent::start(1, metadata, &config, engine.clone()).await;
            assert!(matches!(result, Err(EngineError::InvalidSource(_))), "{name}");
        }

        assert!(!scratch_root.exists());
        assert!(!root.path().join("escaped.mp4").exists());
    }

    #[tokio::test]
    async fn test_scratch_dir_survives_concurrent_root_removal() {
        let root = tempfile::tempdir().unwrap();
        let scratch_root = root.path().join("scratch");

        for round in 0..20 {
            let torrent_dir = scratch_root.join(format!("torrent-{round}"));
            let (created, _) = tokio::join!(
                create_scratch_dir(&torrent_dir),
                tokio::fs::remove_dir(&scratch_root),
            );
            created.unwrap();
            assert!(torrent_dir.exists());
            std::fs::remove_dir(&torrent_dir).unwrap();
        }
    }

    #[tokio::test]
    async fn test_magnet_name_with_path_waits_for_metadata() {
        let root = tempfile::tempdir().unwrap();
        let scratch_root = root.path().join("scratch");
        let config = EngineConfig {
            scratch_root: scratch_root.clone(),
            metadata_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let pending = engine.add(magnet("..%2F..%2Fescaped.mp4", 64));
        assert!(
            tokio::time::timeout(Duration::from_millis(100), pending)
                .await
                .is_err()
        );

        assert!(!scratch_root.exists());
        assert!(!root.path().join("escaped.mp4").exists());
    }

    #[tokio::test]
    async fn test_read_waits_for_throttled_download() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            scratch_root: scratch.path().to_path_buf(),
            download_rate: 64 * 1024,
            chunk_size: 4 * 1024,
            metadata_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let torrent = engine.add(magnet("clip.mkv", 32 * 1024)).await.unwrap();
        let file = torrent.files()[0].clone();

        let tail = collect(torrent.read(&file, 30 * 1024, 32 * 1024 - 1).unwrap()).await;
        assert_eq!(tail.len(), 2 * 1024);

        let stats = torrent.stats();
        assert_eq!(stats.length, 32 * 1024);
        assert!(stats.downloaded >= 32 * 1024);

        torrent.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_ends_pending_reads() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            scratch_root: scratch.path().to_path_buf(),
            download_rate: 1024,
            chunk_size: 1024,
            metadata_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let torrent = engine.add(magnet("big.mp4", 1 << 20)).await.unwrap();
        let file = torrent.files()[0].clone();
        let reader = torrent.read(&file, (1 << 20) - 10, (1 << 20) - 1).unwrap();

        torrent.destroy().await.unwrap();

        let result: Result<Vec<Bytes>, EngineError> = reader.try_collect().await;
        assert!(matches!(result, Err(EngineError::Destroyed { .. })));
    }

    #[tokio::test]
    async fn test_read_outside_file_is_rejected() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            scratch_root: scratch.path().to_path_buf(),
            metadata_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let torrent = engine.add(magnet("a.mp4", 100)).await.unwrap();
        let file = torrent.files()[0].clone();
        assert!(matches!(
            torrent.read(&file, 50, 100),
            Err(EngineError::ReadFailed { .. })
        ));

        let stranger = FileHandle {
            index: 3,
            ..file
        };
        assert!(matches!(
            torrent.read(&stranger, 0, 1),
            Err(EngineError::UnknownFile { index: 3, .. })
        ));

        torrent.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_magnet_without_metadata_waits_for_registration() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            scratch_root: scratch.path().to_path_buf(),
            metadata_delay: Duration::ZERO,
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let link = format!("magnet:?xt=urn:btih:{HASH}");
        let source = TorrentSource::Magnet(MagnetParser::parse_magnet_link(&link).unwrap());
        let mut pending = engine.add(source);

        let early = tokio::time::timeout(Duration::from_millis(50), &mut pending).await;
        assert!(early.is_err());
        assert_eq!(engine.stats().await.unwrap().waiting_magnets, 1);

        let metadata = TorrentMetadata::single_file(
            InfoHash::from_hex(HASH).unwrap(),
            "late.mp4",
            4096,
            16 * 1024,
        );
        engine.register_metadata(metadata).await.unwrap();

        let torrent = pending.await.unwrap();
        assert_eq!(torrent.name(), "late.mp4");
        torrent.destroy().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolution_is_dropped() {
        let scratch = tempfile::tempdir().unwrap();
        let config = EngineConfig {
            scratch_root: scratch.path().to_path_buf(),
            metadata_delay: Duration::from_secs(60),
            ..EngineConfig::default()
        };
        let engine = spawn_simulated_engine(config);

        let pending = engine.add(magnet("slow.mp4", 10));
        pending.cancel();
        drop(pending);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(engine.stats().await.unwrap().active_torrents, 0);
    }
}
