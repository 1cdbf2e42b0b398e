//! Turning a magnet link or torrent file into an `Active` session.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::manager::SessionManager;
use super::registry::Admission;
use super::selector::select;
use super::telemetry::{TelemetrySink, TelemetryTask};
use super::types::{Session, SessionSource, SessionSummary, SourceKind};
use super::SessionError;
use crate::engine::{EngineError, EngineTorrent, TorrentSource};
use crate::torrent::MagnetParser;

impl SessionManager {
    /// Starts streaming `source`, publishing status to `sink`.
    ///
    /// A magnet link for a torrent that is already streaming, or a torrent
    /// whose primary file already has a session, joins the existing session
    /// instead of starting a second engine instance. The caller holds the
    /// returned session until it calls [`SessionManager::release`].
    ///
    /// # Errors
    /// - `SessionError::InvalidDescriptor` - Malformed magnet link or torrent file
    /// - `SessionError::NoMediaFound` - Torrent holds no video file
    /// - `SessionError::EngineFailure` - Resolution failed or timed out
    pub async fn start(
        &self,
        source: SessionSource,
        sink: Arc<dyn TelemetrySink>,
    ) -> Result<SessionSummary, SessionError> {
        let kind = source.kind();
        let torrent_source = match source {
            SessionSource::Locator(link) => {
                let magnet = MagnetParser::parse_magnet_link(&link).map_err(|e| {
                    SessionError::InvalidDescriptor {
                        kind,
                        reason: e.to_string(),
                    }
                })?;
                if let Some(existing) = self.registry.attach_by_info_hash(magnet.info_hash) {
                    info!(
                        "Torrent {} already streaming as session {}",
                        magnet.info_hash,
                        existing.id()
                    );
                    return Ok(existing.summary());
                }
                TorrentSource::Magnet(magnet)
            }
            SessionSource::Descriptor(bytes) => {
                if bytes.is_empty() {
                    return Err(SessionError::InvalidDescriptor {
                        kind,
                        reason: "empty torrent file".to_string(),
                    });
                }
                TorrentSource::Descriptor(bytes)
            }
        };

        let torrent = self.resolve(kind, torrent_source).await?;

        let Some(selection) = select(torrent.files()) else {
            let info_hash = torrent.info_hash();
            info!("Torrent {} has no video file", info_hash);
            self.dispose(&torrent).await;
            return Err(SessionError::NoMediaFound { info_hash });
        };

        let session = Arc::new(Session::new(torrent, selection));
        session.attach_telemetry(TelemetryTask::start(
            session.torrent().clone(),
            sink,
            self.config.telemetry_interval,
        ));

        loop {
            match self.registry.admit(session.clone()) {
                Admission::Inserted => {
                    info!(
                        "Session {} started at {}: {} ({} bytes, {} captions)",
                        session.id(),
                        session.created_at().to_rfc3339(),
                        session.primary().name,
                        session.primary().length,
                        session.captions().len()
                    );
                    return Ok(session.summary());
                }
                Admission::Joined(existing) => {
                    debug!(
                        "Session {} already active, discarding duplicate torrent",
                        existing.id()
                    );
                    session.stop_telemetry();
                    self.dispose(session.torrent()).await;
                    return Ok(existing.summary());
                }
                Admission::Retiring(existing) => {
                    debug!("Waiting for session {} to close", existing.id());
                    existing.closed().await;
                }
            }
        }
    }

    /// Waits for the engine, giving up after the resolve timeout.
    async fn resolve(
        &self,
        kind: SourceKind,
        source: TorrentSource,
    ) -> Result<Arc<dyn EngineTorrent>, SessionError> {
        let mut pending = self.engine.add(source);

        match tokio::time::timeout(self.config.resolve_timeout, &mut pending).await {
            Ok(resolved) => resolved.map_err(|e| {
                warn!("Engine could not resolve {}: {}", kind, e);
                SessionError::engine(kind, e)
            }),
            Err(_) => {
                pending.cancel();
                warn!(
                    "No metadata for {} after {:?}, giving up",
                    kind, self.config.resolve_timeout
                );
                Err(SessionError::EngineFailure(EngineError::ResolveFailed {
                    reason: format!("timed out after {:?}", self.config.resolve_timeout),
                }))
            }
        }
    }
}
