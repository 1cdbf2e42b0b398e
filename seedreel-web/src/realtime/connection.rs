//! Per-connection control state, independent of the WebSocket transport.

use std::sync::Arc;

use seedreel_core::SessionManager;
use seedreel_core::session::{StatusUpdate, TelemetrySink};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::messages::{ClientMessage, ServerMessage};

/// Message shown for frames that are not a known JSON message.
pub const MALFORMED_MESSAGE: &str = "Internal server error";
/// Message shown when the uploaded `.torrent` payload cannot be decoded.
pub const INVALID_PAYLOAD: &str = "Invalid torrent file";

/// Pushes status updates into the connection's outbound queue.
///
/// A full queue drops the update; the next tick carries fresher numbers.
pub struct ChannelSink {
    outbound: mpsc::Sender<ServerMessage>,
}

impl ChannelSink {
    pub fn new(outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self { outbound }
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&self, update: StatusUpdate) {
        if self.outbound.try_send(ServerMessage::Status(update)).is_err() {
            debug!("Dropped status update for a slow or closed connection");
        }
    }
}

/// One client's view of the control channel.
///
/// Holds at most one session. Starting a new one releases the previous
/// hold first, and closing the connection releases whatever is held.
pub struct Connection {
    manager: Arc<SessionManager>,
    outbound: mpsc::Sender<ServerMessage>,
    current: Option<String>,
}

impl Connection {
    pub fn new(manager: Arc<SessionManager>, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            manager,
            outbound,
            current: None,
        }
    }

    /// Id of the session this connection holds.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Handles one text frame. Messages are processed one at a time.
    pub async fn handle_text(&mut self, text: &str) {
        let message = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unreadable control message: {}", e);
                self.send(ServerMessage::error(MALFORMED_MESSAGE)).await;
                return;
            }
        };

        let source = match message.into_source() {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!("Client asked to disconnect");
                self.release_current().await;
                return;
            }
            Err(e) => {
                warn!("{}", e);
                self.send(ServerMessage::error(INVALID_PAYLOAD)).await;
                return;
            }
        };

        self.release_current().await;

        let sink: Arc<dyn TelemetrySink> = Arc::new(ChannelSink::new(self.outbound.clone()));
        match self.manager.start(source, sink).await {
            Ok(summary) => {
                info!("Streaming {} as {}", summary.file_name, summary.id);
                self.current = Some(summary.id.clone());
                self.send(ServerMessage::from(summary)).await;
            }
            Err(e) => {
                warn!("Failed to start session: {}", e);
                self.send(ServerMessage::error(e.user_message())).await;
            }
        }
    }

    /// Releases the held session, if any.
    pub async fn close(&mut self) {
        self.release_current().await;
    }

    async fn release_current(&mut self) {
        if let Some(id) = self.current.take() {
            self.manager.release(&id).await;
        }
    }

    async fn send(&self, message: ServerMessage) {
        if self.outbound.send(message).await.is_err() {
            debug!("Connection closed before reply could be sent");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use seedreel_core::config::SessionConfig;
    use seedreel_core::engine::{MockEngine, MockFile};

    use super::*;

    const MAGNET: &str = r#"{"type":"magnetLink","magnetLink":"magnet:?xt=urn:btih:abababababababababababababababababababab"}"#;

    fn connection(engine: MockEngine) -> (Connection, mpsc::Receiver<ServerMessage>, Arc<SessionManager>) {
        let config = SessionConfig {
            telemetry_interval: Duration::from_secs(60),
            cleanup_delay: Duration::ZERO,
            resolve_timeout: Duration::from_secs(1),
        };
        let manager = Arc::new(SessionManager::new(Arc::new(engine), config));
        let (tx, rx) = mpsc::channel(16);
        (Connection::new(manager.clone(), tx), rx, manager)
    }

    #[tokio::test]
    async fn test_start_then_disconnect() {
        let (mut conn, mut rx, manager) =
            connection(MockEngine::new(vec![MockFile::new("movie.mp4", 1000)]));

        conn.handle_text(MAGNET).await;
        let Some(ServerMessage::VideoUrl { file_name, url, .. }) = rx.recv().await else {
            panic!("expected videoURL");
        };
        assert_eq!(file_name, "movie.mp4");
        assert!(url.starts_with("/stream/"));
        assert_eq!(manager.active_sessions(), 1);

        conn.handle_text(r#"{"type":"disconnect"}"#).await;
        assert!(conn.current().is_none());
        assert_eq!(manager.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_malformed_frames_report_errors() {
        let (mut conn, mut rx, _) = connection(MockEngine::new(vec![]));

        conn.handle_text("{not json").await;
        assert_eq!(rx.recv().await, Some(ServerMessage::error("Internal server error")));

        conn.handle_text(r#"{"type":"torrentFile","fileData":"@@@"}"#)
            .await;
        assert_eq!(rx.recv().await, Some(ServerMessage::error("Invalid torrent file")));
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let (mut conn, mut rx, manager) = connection(MockEngine::new(vec![MockFile::new(
            "readme.txt",
            10,
        )]));

        conn.handle_text(MAGNET).await;
        assert_eq!(
            rx.recv().await,
            Some(ServerMessage::error("No video file found in torrent"))
        );
        assert!(conn.current().is_none());
        assert!(manager.registry().is_empty());
    }

    #[tokio::test]
    async fn test_new_start_releases_previous_session() {
        let engine = MockEngine::new(vec![MockFile::new("movie.mp4", 1000)]);
        let (mut conn, mut rx, manager) = connection(engine);

        conn.handle_text(MAGNET).await;
        rx.recv().await.unwrap();
        conn.handle_text(MAGNET).await;
        rx.recv().await.unwrap();
        assert_eq!(manager.active_sessions(), 1);

        conn.close().await;
        assert_eq!(manager.active_sessions(), 0);
    }
}
