//! Seedreel CLI - Command-line interface
//!
//! Runs the streaming server or inspects what a torrent would stream.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use seedreel_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "seedreel")]
#[command(about = "Stream video from torrents straight to the browser")]
struct Cli {
    /// Console log level (RUST_LOG overrides it)
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    /// Directory for the per-run debug log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), cli.logs_dir.as_deref())?;

    commands::handle_command(cli.command).await
}
