//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Subcommand;
use seedreel_core::engine::FileHandle;
use seedreel_core::session::{MediaKind, classify, select, session_id_for};
use seedreel_core::torrent::{BencodeParser, MagnetParser, TorrentMetadata};
use seedreel_core::{SeedreelConfig, SessionManager, spawn_simulated_engine};
use tokio::fs;
use tracing::{info, warn};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the streaming server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (defaults to $PORT, then 3000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory the engine writes retrieved content into
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
        /// Directory holding real files to seed content from
        #[arg(long)]
        seed_dir: Option<PathBuf>,
        /// Directory with the browser client
        #[arg(long)]
        public_dir: Option<PathBuf>,
        /// `.torrent` files whose metadata magnet links can resolve to
        #[arg(long = "seed-torrent")]
        seed_torrents: Vec<PathBuf>,
        /// Simulated download rate in bytes per second (0 = unthrottled)
        #[arg(long)]
        download_rate: Option<u64>,
    },
    /// Show which files a torrent would stream
    Inspect {
        /// Magnet link or path to a `.torrent` file
        source: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the first failure of the command
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            scratch_dir,
            seed_dir,
            public_dir,
            seed_torrents,
            download_rate,
        } => {
            let mut config = SeedreelConfig::from_env();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(dir) = scratch_dir {
                config.engine.scratch_root = dir;
            }
            if seed_dir.is_some() {
                config.engine.seed_dir = seed_dir;
            }
            if public_dir.is_some() {
                config.server.public_dir = public_dir;
            }
            if let Some(rate) = download_rate {
                config.engine.download_rate = rate;
            }
            serve(config, &seed_torrents).await
        }
        Commands::Inspect { source } => inspect(&source).await,
    }
}

/// Runs the server until Ctrl-C.
///
/// # Errors
/// - A seed torrent could not be read or parsed
/// - The listener could not be bound
pub async fn serve(config: SeedreelConfig, seed_torrents: &[PathBuf]) -> anyhow::Result<()> {
    let engine = spawn_simulated_engine(config.engine.clone());

    for path in seed_torrents {
        let bytes = fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let info_hash = engine
            .register_descriptor(&bytes)
            .await
            .with_context(|| format!("registering {}", path.display()))?;
        info!("Registered {} as {}", path.display(), info_hash);
    }

    let manager = Arc::new(SessionManager::new(
        Arc::new(engine.clone()),
        config.session.clone(),
    ));
    seedreel_web::run_server(manager, &config.server).await?;

    if let Err(e) = engine.shutdown().await {
        warn!("Engine did not shut down cleanly: {}", e);
    }
    // Only succeeds once every session has cleaned up after itself.
    let _ = fs::remove_dir(&config.engine.scratch_root).await;
    Ok(())
}

/// Prints the file selection for a magnet link or `.torrent` file.
///
/// # Errors
/// - The source is neither a valid magnet link nor a readable torrent file
pub async fn inspect(source: &str) -> anyhow::Result<()> {
    let metadata = if MagnetParser::is_valid_locator(source) {
        let magnet = MagnetParser::parse_magnet_link(source)?;
        println!("Magnet link: {}", magnet.info_hash);
        match (magnet.display_name, magnet.exact_length) {
            (Some(name), Some(length)) => TorrentMetadata::single_file(
                magnet.info_hash,
                &name,
                length,
                SeedreelConfig::default().engine.default_piece_length,
            ),
            _ => {
                println!("  File list unknown until metadata is fetched from peers");
                return Ok(());
            }
        }
    } else {
        let bytes = fs::read(source)
            .await
            .with_context(|| format!("reading {source}"))?;
        BencodeParser::parse_bencode_data(&bytes)?
    };

    print_selection(&metadata)
}

fn print_selection(metadata: &TorrentMetadata) -> anyhow::Result<()> {
    println!("Torrent: {} ({})", metadata.name, metadata.info_hash);
    println!(
        "  {} files, {:.2} MB, {} pieces",
        metadata.files.len(),
        metadata.total_length as f64 / 1_048_576.0,
        metadata.piece_count
    );

    let files = FileHandle::all(metadata);
    for file in &files {
        let kind = match classify(&file.name) {
            MediaKind::Video => "video",
            MediaKind::Caption => "caption",
            MediaKind::Other => "-",
        };
        println!("  [{:>3}] {:<8} {:>12}  {}", file.index, kind, file.length, file.path);
    }

    let Some(selection) = select(&files) else {
        bail!("No video file found in torrent");
    };
    println!();
    println!(
        "Streams {} as /stream/{}",
        selection.primary.name,
        session_id_for(&selection.primary.name)
    );
    for (index, caption) in selection.captions.iter().enumerate() {
        println!("  caption {index}: {}", caption.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &[u8] = b"d4:infod5:filesld6:lengthi2000e4:pathl9:movie.mp4eed6:lengthi10e4:pathl9:movie.srteee4:name4:Show12:piece lengthi16384e6:pieces20:abcdefghijabcdefghijee";

    #[tokio::test]
    async fn test_inspect_torrent_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("show.torrent");
        std::fs::write(&path, DESCRIPTOR).unwrap();

        inspect(path.to_str().unwrap()).await.unwrap();
    }

    #[test]
    fn test_inspect_without_video_fails() {
        let metadata = TorrentMetadata::single_file(
            seedreel_core::InfoHash::new([1; 20]),
            "notes.txt",
            10,
            16384,
        );
        assert!(print_selection(&metadata).is_err());
    }

    #[tokio::test]
    async fn test_inspect_magnet_without_length() {
        inspect("magnet:?xt=urn:btih:abababababababababababababababababababab")
            .await
            .unwrap();
        assert!(inspect("not-a-file-or-magnet").await.is_err());
    }
}
