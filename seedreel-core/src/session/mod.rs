//! Session lifecycle
//!
//! A session is one ingestion-plus-streaming context: a resolved torrent, the
//! media file picked from it, its caption files and a telemetry task. The
//! [`SessionManager`] starts sessions, hands them to the streaming bridges
//! and retires them exactly once.

mod ingest;
mod manager;
mod registry;
mod selector;
mod teardown;
mod telemetry;
mod types;

use std::path::PathBuf;

pub use manager::SessionManager;
pub use registry::{Admission, DrainTicket, Release, SessionRegistry};
pub use selector::{MediaKind, MediaSelection, classify, select};
pub use telemetry::{BufferStatus, StatusUpdate, TelemetrySink, TelemetryTask};
pub use types::{Session, SessionSource, SessionState, SessionSummary, SourceKind, session_id_for};

use crate::engine::EngineError;
use crate::torrent::InfoHash;

/// Errors from starting, streaming and retiring sessions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid {kind}: {reason}")]
    InvalidDescriptor { kind: SourceKind, reason: String },

    #[error("Torrent {info_hash} contains no video file")]
    NoMediaFound { info_hash: InfoHash },

    #[error("No active session {id}")]
    SessionNotFound { id: String },

    #[error("Session {id} has no caption {index}")]
    CaptionNotFound { id: String, index: usize },

    #[error("Range not satisfiable for {total} bytes")]
    RangeUnsatisfiable { total: u64 },

    #[error("Engine failure: {0}")]
    EngineFailure(#[source] EngineError),

    #[error("Failed to remove {}: {reason}", path.display())]
    CleanupFailure { path: PathBuf, reason: String },
}

impl SessionError {
    /// Single-line message shown to the client.
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::InvalidDescriptor {
                kind: SourceKind::Locator,
                ..
            } => "Invalid magnet link",
            SessionError::InvalidDescriptor {
                kind: SourceKind::Descriptor,
                ..
            } => "Invalid torrent file",
            SessionError::NoMediaFound { .. } => "No video file found in torrent",
            SessionError::SessionNotFound { .. } => "Video not found",
            SessionError::CaptionNotFound { .. } => "Subtitle not found",
            SessionError::RangeUnsatisfiable { .. } => "Requested range not satisfiable",
            SessionError::EngineFailure(_) => "Failed to add torrent",
            SessionError::CleanupFailure { .. } => "Internal server error",
        }
    }

    pub(crate) fn engine(kind: SourceKind, error: EngineError) -> Self {
        match error {
            EngineError::InvalidSource(e) => SessionError::InvalidDescriptor {
                kind,
                reason: e.to_string(),
            },
            other => SessionError::EngineFailure(other),
        }
    }
}
