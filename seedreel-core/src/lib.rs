//! Seedreel Core - session lifecycle and range streaming over a torrent engine
//!
//! This crate turns a resolved torrent into something an HTTP media client can
//! play while pieces are still arriving: it picks the primary media file,
//! registers a session, publishes transfer telemetry, serves byte ranges and
//! captions, and retires engine resources exactly once when a session ends.

pub mod config;
pub mod engine;
pub mod session;
pub mod streaming;
pub mod torrent;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::SeedreelConfig;
pub use engine::{Engine, EngineError, EngineHandle, EngineTorrent, spawn_simulated_engine};
pub use session::{SessionError, SessionManager, SessionSource, SessionSummary};
pub use torrent::{InfoHash, TorrentError};

/// Errors that can bubble up from any Seedreel subsystem.
#[derive(Debug, thiserror::Error)]
pub enum SeedreelError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Torrent error: {0}")]
    Torrent(#[from] TorrentError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SeedreelError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SeedreelError::Session(e) => e.user_message().to_string(),
            SeedreelError::Engine(_) => "Torrent engine error occurred".to_string(),
            SeedreelError::Torrent(e) => match e {
                TorrentError::InvalidMagnetLink { .. } => "Invalid magnet link".to_string(),
                TorrentError::InvalidTorrentFile { .. } => "Invalid torrent file".to_string(),
            },
            SeedreelError::Configuration { .. } => "Configuration error occurred".to_string(),
            SeedreelError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SeedreelError::Configuration { .. }
                | SeedreelError::Torrent(_)
                | SeedreelError::Session(SessionError::InvalidDescriptor { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, SeedreelError>;
