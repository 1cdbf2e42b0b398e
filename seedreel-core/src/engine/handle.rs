//! Handle for communicating with the simulated engine actor.

use tokio::sync::{mpsc, oneshot};

use super::commands::{EngineCommand, EngineStats};
use super::pending::PendingTorrent;
use super::{Engine, EngineError, TorrentSource};
use crate::torrent::{BencodeParser, InfoHash, TorrentMetadata};

/// Cloneable handle to the simulated engine.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub(crate) fn new(sender: mpsc::UnboundedSender<EngineCommand>) -> Self {
        Self { sender }
    }

    /// Makes a `.torrent` file known so magnet links for it resolve.
    ///
    /// # Errors
    /// - `EngineError::InvalidSource` - Descriptor does not parse
    /// - `EngineError::Shutdown` - Engine actor has stopped
    pub async fn register_descriptor(&self, descriptor: &[u8]) -> Result<InfoHash, EngineError> {
        let metadata = BencodeParser::parse_bencode_data(descriptor)?;
        self.register_metadata(metadata).await
    }

    /// Makes metadata known so magnet links with its info hash resolve.
    ///
    /// # Errors
    /// - `EngineError::Shutdown` - Engine actor has stopped
    pub async fn register_metadata(
        &self,
        metadata: TorrentMetadata,
    ) -> Result<InfoHash, EngineError> {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::RegisterMetadata {
                metadata,
                responder,
            })
            .map_err(|_| EngineError::Shutdown)?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// # Errors
    /// - `EngineError::Shutdown` - Engine actor has stopped
    pub async fn stats(&self) -> Result<EngineStats, EngineError> {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::GetStats { responder })
            .map_err(|_| EngineError::Shutdown)?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }

    /// Stops the actor. Torrents still alive stop transferring.
    ///
    /// # Errors
    /// - `EngineError::Shutdown` - Engine actor had already stopped
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let (responder, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Shutdown { responder })
            .map_err(|_| EngineError::Shutdown)?;
        rx.await.map_err(|_| EngineError::Shutdown)
    }
}

impl Engine for EngineHandle {
    fn add(&self, source: TorrentSource) -> PendingTorrent {
        let (responder, pending) = PendingTorrent::channel();
        // A closed actor drops the responder, which resolves the handle to
        // `EngineError::Shutdown`.
        let _ = self.sender.send(EngineCommand::Add { source, responder });
        pending
    }
}
