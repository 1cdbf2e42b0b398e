//! Session record and the values it hands out.

use std::fmt;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use super::selector::MediaSelection;
use super::telemetry::TelemetryTask;
use crate::engine::{EngineTorrent, FileHandle};
use crate::torrent::InfoHash;

/// What a client asked to stream.
#[derive(Debug, Clone)]
pub enum SessionSource {
    /// Magnet link as typed by the user
    Locator(String),
    /// Uploaded `.torrent` bytes
    Descriptor(Bytes),
}

impl SessionSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            SessionSource::Locator(_) => SourceKind::Locator,
            SessionSource::Descriptor(_) => SourceKind::Descriptor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Locator,
    Descriptor,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Locator => write!(f, "magnet link"),
            SourceKind::Descriptor => write!(f, "torrent file"),
        }
    }
}

/// Lifecycle state. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Initializing,
    Active,
    Draining,
    Closed,
}

/// What a client learns about a started session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub file_name: String,
    pub subtitle_count: usize,
    pub subtitle_names: Vec<String>,
}

/// Session id for a primary file name.
///
/// URL-safe base64 keeps the id usable as a single path segment.
pub fn session_id_for(file_name: &str) -> String {
    URL_SAFE_NO_PAD.encode(file_name.as_bytes())
}

/// One resolved torrent and the files picked from it.
pub struct Session {
    id: String,
    info_hash: InfoHash,
    primary: FileHandle,
    captions: Vec<FileHandle>,
    torrent: Arc<dyn EngineTorrent>,
    telemetry: Mutex<Option<TelemetryTask>>,
    state: watch::Sender<SessionState>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(torrent: Arc<dyn EngineTorrent>, selection: MediaSelection) -> Self {
        let MediaSelection { primary, captions } = selection;
        Self {
            id: session_id_for(&primary.name),
            info_hash: torrent.info_hash(),
            primary,
            captions,
            torrent,
            telemetry: Mutex::new(None),
            state: watch::Sender::new(SessionState::Initializing),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info_hash(&self) -> InfoHash {
        self.info_hash
    }

    /// The streamed media file.
    pub fn primary(&self) -> &FileHandle {
        &self.primary
    }

    /// Caption files in presentation order.
    pub fn captions(&self) -> &[FileHandle] {
        &self.captions
    }

    pub fn torrent(&self) -> &Arc<dyn EngineTorrent> {
        &self.torrent
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the session was created.
    pub fn uptime(&self) -> TimeDelta {
        Utc::now() - self.created_at
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            file_name: self.primary.name.clone(),
            subtitle_count: self.captions.len(),
            // Captions are classified by extension, so every one has a name.
            subtitle_names: self
                .captions
                .iter()
                .map(|caption| caption.name.clone())
                .collect(),
        }
    }

    /// Resolves once the session reaches `Closed`.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state
            .wait_for(|state| *state == SessionState::Closed)
            .await;
    }

    /// Moves the state forward; backwards moves are ignored.
    pub(crate) fn advance(&self, next: SessionState) {
        self.state.send_if_modified(|state| {
            if next > *state {
                *state = next;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn attach_telemetry(&self, task: TelemetryTask) {
        if let Some(previous) = self.telemetry.lock().replace(task) {
            previous.stop();
        }
    }

    pub(crate) fn stop_telemetry(&self) {
        if let Some(task) = self.telemetry.lock().take() {
            task.stop();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("info_hash", &self.info_hash)
            .field("primary", &self.primary.name)
            .field("captions", &self.captions.len())
            .field("state", &self.state())
            .finish()
    }
}
