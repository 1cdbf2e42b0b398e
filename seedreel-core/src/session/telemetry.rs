//! Periodic transfer status for a session's client.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::engine::{EngineTorrent, TransferStats};

/// Receiver of status updates.
///
/// `publish` must not block; a sink that cannot take an update right now
/// drops it.
pub trait TelemetrySink: Send + Sync + 'static {
    fn publish(&self, update: StatusUpdate);
}

impl<F> TelemetrySink for F
where
    F: Fn(StatusUpdate) + Send + Sync + 'static,
{
    fn publish(&self, update: StatusUpdate) {
        self(update)
    }
}

/// One telemetry tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub download_speed: u64,
    pub upload_speed: u64,
    pub progress: f64,
    pub peers: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seeds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leechers: Option<u32>,
    pub buffer: BufferStatus,
}

/// How much of the torrent is on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferStatus {
    pub progress: f64,
    pub downloaded: u64,
    pub download_speed: u64,
    pub length: u64,
    /// Fraction of pieces complete
    pub pieces: f64,
}

impl From<TransferStats> for StatusUpdate {
    fn from(stats: TransferStats) -> Self {
        Self {
            download_speed: stats.download_rate,
            upload_speed: stats.upload_rate,
            progress: stats.progress,
            peers: stats.peers,
            seeds: stats.seeds,
            leechers: stats.leechers,
            buffer: BufferStatus {
                progress: stats.progress,
                downloaded: stats.downloaded,
                download_speed: stats.download_rate,
                length: stats.length,
                pieces: stats.pieces_complete,
            },
        }
    }
}

/// Handle to a running sampling loop.
///
/// Dropping the handle stops the loop as well.
#[derive(Debug)]
pub struct TelemetryTask {
    cancel: CancellationToken,
}

impl TelemetryTask {
    /// Samples `torrent` every `interval` and publishes to `sink`.
    ///
    /// The first tick fires one interval after the start.
    pub fn start(
        torrent: Arc<dyn EngineTorrent>,
        sink: Arc<dyn TelemetrySink>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(run(torrent, sink, period, cancel.clone()));
        Self { cancel }
    }

    /// Stops the loop. No tick starts after this returns; safe to call
    /// repeatedly.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TelemetryTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    torrent: Arc<dyn EngineTorrent>,
    sink: Arc<dyn TelemetrySink>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if cancel.is_cancelled() {
            break;
        }
        sink.publish(StatusUpdate::from(torrent.stats()));
    }
    trace!("Telemetry for {} stopped", torrent.info_hash());
}
