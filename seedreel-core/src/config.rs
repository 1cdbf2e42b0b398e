//! Centralized configuration for Seedreel.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Default HTTP port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Central configuration for all Seedreel components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct SeedreelConfig {
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub engine: EngineConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Listening port
    pub port: u16,
    /// Directory of static client assets served as the router fallback
    pub public_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            public_dir: None,
        }
    }
}

/// Session lifecycle timing.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Cadence of status messages pushed to the control channel
    pub telemetry_interval: Duration,
    /// Pause before deleting scratch data so the OS can release file handles
    pub cleanup_delay: Duration,
    /// Upper bound on waiting for the engine to resolve a source
    pub resolve_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            telemetry_interval: Duration::from_secs(1),
            cleanup_delay: Duration::from_millis(500),
            resolve_timeout: Duration::from_secs(30),
        }
    }
}

/// Simulated engine configuration.
///
/// Controls where content is materialised, how fast it "arrives", and where
/// real seed content is looked up.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shared on-disk working directory for retrieved content
    pub scratch_root: PathBuf,
    /// Directory holding real files to seed content from
    pub seed_dir: Option<PathBuf>,
    /// Simulated download rate in bytes per second (0 = unthrottled)
    pub download_rate: u64,
    /// Size of each write into the scratch root
    pub chunk_size: usize,
    /// Simulated delay before metadata is available
    pub metadata_delay: Duration,
    /// Peer count reported while downloading
    pub simulated_peers: u32,
    /// Piece length used for torrents synthesised from magnet links
    pub default_piece_length: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("seedreel"),
            seed_dir: None,
            download_rate: 4 * 1024 * 1024, // 4 MiB/s
            chunk_size: 64 * 1024,          // 64 KiB
            metadata_delay: Duration::from_millis(250),
            simulated_peers: 12,
            default_piece_length: 256 * 1024, // 256 KiB
        }
    }
}

impl SeedreelConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// `PORT` selects the listening port; the remaining variables are
    /// Seedreel-specific knobs for the engine and listener.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration with overrides read through `lookup`.
    ///
    /// Unparseable numbers leave the default in place.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT").and_then(|port| port.parse::<u16>().ok()) {
            config.server.port = port;
        }

        if let Some(host) = lookup("SEEDREEL_HOST") {
            config.server.host = host;
        }

        if let Some(dir) = lookup("SEEDREEL_PUBLIC_DIR") {
            config.server.public_dir = Some(PathBuf::from(dir));
        }

        if let Some(dir) = lookup("SEEDREEL_SCRATCH_DIR") {
            config.engine.scratch_root = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("SEEDREEL_SEED_DIR") {
            config.engine.seed_dir = Some(PathBuf::from(dir));
        }

        if let Some(rate) =
            lookup("SEEDREEL_DOWNLOAD_RATE").and_then(|rate| rate.parse::<u64>().ok())
        {
            config.engine.download_rate = rate;
        }

        config
    }

    /// Creates a configuration optimized for testing.
    ///
    /// Timers are shortened and the engine is unthrottled so lifecycle tests
    /// finish quickly.
    pub fn for_testing(scratch_root: PathBuf) -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                public_dir: None,
            },
            session: SessionConfig {
                telemetry_interval: Duration::from_millis(50),
                cleanup_delay: Duration::from_millis(10),
                resolve_timeout: Duration::from_secs(5),
            },
            engine: EngineConfig {
                scratch_root,
                seed_dir: None,
                download_rate: 0,
                chunk_size: 16 * 1024,
                metadata_delay: Duration::ZERO,
                simulated_peers: 3,
                default_piece_length: 16 * 1024,
            },
        }
    }

    /// Address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
