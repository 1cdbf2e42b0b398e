//! Façade the transport layer holds on to.

use std::sync::Arc;

use super::SessionError;
use super::registry::SessionRegistry;
use super::types::{Session, SessionSummary};
use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::streaming::{CaptionBridge, CaptionStream, MediaStream, RangeStreamBridge};

/// Owns the registry and the engine and runs every session operation.
///
/// Starting lives in `ingest.rs`, retiring in `teardown.rs`.
pub struct SessionManager {
    pub(super) engine: Arc<dyn Engine>,
    pub(super) registry: SessionRegistry,
    pub(super) config: SessionConfig,
}

impl SessionManager {
    pub fn new(engine: Arc<dyn Engine>, config: SessionConfig) -> Self {
        Self {
            engine,
            registry: SessionRegistry::new(),
            config,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The `Active` session with `id`.
    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.registry.active(id)
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.active_count()
    }

    /// Takes another hold on the `Active` session `id`. Pair it with
    /// [`SessionManager::release`].
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` - Unknown or retiring session
    pub fn attach(&self, id: &str) -> Result<SessionSummary, SessionError> {
        self.registry
            .attach(id)
            .map(|session| session.summary())
            .ok_or_else(|| SessionError::SessionNotFound { id: id.to_string() })
    }

    /// Opens the primary file of session `id`, honouring a `Range` header.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` - Unknown or retiring session
    /// - `SessionError::RangeUnsatisfiable` - Range starts past the end
    /// - `SessionError::EngineFailure` - Engine refused the read
    pub fn open_stream(&self, id: &str, range: Option<&str>) -> Result<MediaStream, SessionError> {
        RangeStreamBridge::new(&self.registry).handle(id, range)
    }

    /// Opens caption `index` of session `id` as WebVTT.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` - Unknown or retiring session
    /// - `SessionError::CaptionNotFound` - No caption at `index`
    /// - `SessionError::EngineFailure` - Engine refused the read
    pub fn open_caption(&self, id: &str, index: usize) -> Result<CaptionStream, SessionError> {
        CaptionBridge::new(&self.registry).handle(id, index)
    }
}
