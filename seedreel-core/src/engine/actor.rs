//! Actor implementation for the simulated engine.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::commands::{EngineCommand, EngineStats};
use super::handle::EngineHandle;
use super::pending::ResolutionResponder;
use super::simulated::SimulatedTorrent;
use super::{EngineError, EngineTorrent, TorrentSource};
use crate::config::EngineConfig;
use crate::torrent::{BencodeParser, InfoHash, MagnetLink, TorrentMetadata};

/// Spawns the simulated engine actor and returns its handle.
///
/// The actor owns the metadata catalog and the table of live torrents and
/// processes commands one at a time. Downloads and reads run in their own
/// tasks, so a slow disk never stalls command handling.
///
/// # Examples
/// ```rust,no_run
/// # #[tokio::main]
/// # async fn main() {
/// use seedreel_core::config::EngineConfig;
/// use seedreel_core::engine::spawn_simulated_engine;
///
/// let handle = spawn_simulated_engine(EngineConfig::default());
/// # }
/// ```
pub fn spawn_simulated_engine(config: EngineConfig) -> EngineHandle {
    let (sender, receiver) = mpsc::unbounded_channel();
    let actor = SwarmActor {
        config,
        loopback: sender.downgrade(),
        catalog: HashMap::new(),
        waiting: HashMap::new(),
        live: HashMap::new(),
        next_torrent_id: 0,
    };

    tokio::spawn(actor.run(receiver));

    EngineHandle::new(sender)
}

struct SwarmActor {
    config: EngineConfig,
    /// Weak so the loop ends once every handle and torrent is gone.
    loopback: mpsc::WeakUnboundedSender<EngineCommand>,
    catalog: HashMap<InfoHash, TorrentMetadata>,
    waiting: HashMap<InfoHash, Vec<ResolutionResponder>>,
    live: HashMap<u64, Arc<SimulatedTorrent>>,
    next_torrent_id: u64,
}

impl SwarmActor {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<EngineCommand>) {
        debug!(
            "Simulated engine started, scratch root {}",
            self.config.scratch_root.display()
        );

        while let Some(command) = receiver.recv().await {
            if !self.handle_command(command).await {
                break;
            }
        }

        for torrent in self.live.values() {
            torrent.abort();
        }
        debug!("Simulated engine stopped");
    }

    /// Returns false to stop the loop.
    async fn handle_command(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Add { source, responder } => self.add(source, responder),

            EngineCommand::RegisterMetadata {
                metadata,
                responder,
            } => {
                let info_hash = self.register(metadata);
                let _ = responder.send(info_hash);
            }

            EngineCommand::MetadataReady {
                metadata,
                responder,
            } => self.start_torrent(metadata, responder).await,

            EngineCommand::Forget { torrent_id } => {
                if self.live.remove(&torrent_id).is_some() {
                    debug!("Torrent #{} left the live table", torrent_id);
                }
            }

            EngineCommand::GetStats { responder } => {
                let _ = responder.send(self.stats());
            }

            EngineCommand::Shutdown { responder } => {
                debug!("Simulated engine shutting down");
                let _ = responder.send(());
                return false;
            }
        }
        true
    }

    fn add(&mut self, source: TorrentSource, responder: ResolutionResponder) {
        match source {
            TorrentSource::Descriptor(bytes) => match BencodeParser::parse_bencode_data(&bytes) {
                Ok(metadata) => {
                    self.catalog
                        .insert(metadata.info_hash, metadata.clone());
                    self.schedule(metadata, responder);
                }
                Err(e) => {
                    debug!("Rejected descriptor: {}", e);
                    responder.respond(Err(EngineError::InvalidSource(e)));
                }
            },
            TorrentSource::Magnet(magnet) => {
                if let Some(metadata) = self.metadata_for(&magnet) {
                    self.schedule(metadata, responder);
                } else {
                    info!(
                        "Waiting for metadata of {} ({} trackers)",
                        magnet.info_hash,
                        magnet.trackers.len()
                    );
                    let waiting = self.waiting.entry(magnet.info_hash).or_default();
                    waiting.retain(|pending| !pending.is_abandoned());
                    waiting.push(responder);
                }
            }
        }
    }

    /// Known metadata, or a single-file torrent when the link names both
    /// the file and its exact length.
    fn metadata_for(&mut self, magnet: &MagnetLink) -> Option<TorrentMetadata> {
        if let Some(metadata) = self.catalog.get(&magnet.info_hash) {
            return Some(metadata.clone());
        }
        let name = magnet.display_name.as_deref()?;
        let length = magnet.exact_length?;
        let metadata = TorrentMetadata::single_file(
            magnet.info_hash,
            name,
            length,
            self.config.default_piece_length,
        );
        self.catalog.insert(magnet.info_hash, metadata.clone());
        Some(metadata)
    }

    fn register(&mut self, metadata: TorrentMetadata) -> InfoHash {
        let info_hash = metadata.info_hash;
        debug!("Registered metadata for {} ({})", info_hash, metadata.name);

        if let Some(waiting) = self.waiting.remove(&info_hash) {
            for responder in waiting {
                if !responder.is_abandoned() {
                    self.schedule(metadata.clone(), responder);
                }
            }
        }
        self.catalog.insert(info_hash, metadata);
        info_hash
    }

    /// Simulates the metadata exchange delay, then feeds the result back
    /// into the loop.
    fn schedule(&self, metadata: TorrentMetadata, responder: ResolutionResponder) {
        let Some(loopback) = self.loopback.upgrade() else {
            return;
        };
        let delay = self.config.metadata_delay;
        let cancelled = responder.cancelled();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    debug!("Resolution of {} cancelled", metadata.info_hash);
                }
                _ = tokio::time::sleep(delay) => {
                    let _ = loopback.send(EngineCommand::MetadataReady { metadata, responder });
                }
            }
        });
    }

    async fn start_torrent(&mut self, metadata: TorrentMetadata, responder: ResolutionResponder) {
        if responder.is_abandoned() {
            debug!("Dropping abandoned resolution of {}", metadata.info_hash);
            return;
        }
        let Some(loopback) = self.loopback.upgrade() else {
            return;
        };

        let torrent_id = self.next_torrent_id;
        self.next_torrent_id += 1;

        match SimulatedTorrent::start(torrent_id, metadata, &self.config, loopback).await {
            Ok(torrent) => {
                info!(
                    "Torrent #{} {} resolved: {} files, {} bytes",
                    torrent_id,
                    torrent.info_hash(),
                    torrent.files().len(),
                    torrent.stats().length
                );
                self.live.insert(torrent_id, torrent.clone());

                let resolved: Arc<dyn EngineTorrent> = torrent;
                if let Some(unclaimed) = responder.respond(Ok(resolved)) {
                    warn!(
                        "Resolution of {} was abandoned, destroying torrent",
                        unclaimed.info_hash()
                    );
                    tokio::spawn(async move {
                        let _ = unclaimed.destroy().await;
                    });
                }
            }
            Err(e) => {
                warn!("Failed to start torrent #{}: {}", torrent_id, e);
                responder.respond(Err(e));
            }
        }
    }

    fn stats(&self) -> EngineStats {
        EngineStats {
            active_torrents: self.live.len(),
            known_metadata: self.catalog.len(),
            waiting_magnets: self
                .waiting
                .values()
                .flatten()
                .filter(|pending| !pending.is_abandoned())
                .count(),
        }
    }
}
