//! JSON messages of the control channel.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use seedreel_core::session::{SessionSource, SessionSummary, StatusUpdate};
use serde::{Deserialize, Serialize};

/// Client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    MagnetLink { magnet_link: String },
    /// Base64 `.torrent` bytes, optionally as a `data:` URL
    TorrentFile { file_data: String },
    Disconnect,
}

/// The uploaded file could not be decoded.
#[derive(Debug, thiserror::Error)]
#[error("Torrent file payload is not valid base64")]
pub struct PayloadError;

impl ClientMessage {
    /// Session source for a start request, `None` for `disconnect`.
    ///
    /// # Errors
    /// - `PayloadError` - `fileData` is not base64
    pub fn into_source(self) -> Result<Option<SessionSource>, PayloadError> {
        match self {
            ClientMessage::MagnetLink { magnet_link } => {
                Ok(Some(SessionSource::Locator(magnet_link.trim().to_string())))
            }
            ClientMessage::TorrentFile { file_data } => {
                let encoded = file_data
                    .split_once(";base64,")
                    .map_or(file_data.as_str(), |(_, data)| data);
                let bytes = STANDARD.decode(encoded.trim()).map_err(|_| PayloadError)?;
                Ok(Some(SessionSource::Descriptor(Bytes::from(bytes))))
            }
            ClientMessage::Disconnect => Ok(None),
        }
    }
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    #[serde(rename = "videoURL")]
    VideoUrl {
        url: String,
        file_name: String,
        file_id: String,
        subtitle_count: usize,
        subtitle_names: Vec<String>,
    },
    #[serde(rename = "status")]
    Status(StatusUpdate),
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

impl From<SessionSummary> for ServerMessage {
    fn from(summary: SessionSummary) -> Self {
        ServerMessage::VideoUrl {
            url: format!("/stream/{}", summary.id),
            file_name: summary.file_name,
            file_id: summary.id,
            subtitle_count: summary.subtitle_count,
            subtitle_names: summary.subtitle_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_client_messages() {
        let magnet: ClientMessage =
            serde_json::from_str(r#"{"type":"magnetLink","magnetLink":"magnet:?xt=x"}"#).unwrap();
        assert_eq!(
            magnet,
            ClientMessage::MagnetLink {
                magnet_link: "magnet:?xt=x".to_string()
            }
        );

        let disconnect: ClientMessage = serde_json::from_str(r#"{"type":"disconnect"}"#).unwrap();
        assert_eq!(disconnect, ClientMessage::Disconnect);

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"seek"}"#).is_err());
    }

    #[test]
    fn test_torrent_file_payload() {
        let plain = ClientMessage::TorrentFile {
            file_data: STANDARD.encode(b"d4:infode"),
        };
        assert!(matches!(
            plain.into_source().unwrap(),
            Some(SessionSource::Descriptor(bytes)) if bytes == Bytes::from_static(b"d4:infode")
        ));

        let data_url = ClientMessage::TorrentFile {
            file_data: format!(
                "data:application/x-bittorrent;base64,{}",
                STANDARD.encode(b"d4:infode")
            ),
        };
        assert!(matches!(
            data_url.into_source().unwrap(),
            Some(SessionSource::Descriptor(_))
        ));

        let broken = ClientMessage::TorrentFile {
            file_data: "!!not base64!!".to_string(),
        };
        assert!(broken.into_source().is_err());
    }

    #[test]
    fn test_video_url_shape() {
        let message = ServerMessage::from(SessionSummary {
            id: "bW92aWUubXA0".to_string(),
            file_name: "movie.mp4".to_string(),
            subtitle_count: 1,
            subtitle_names: vec!["movie.srt".to_string()],
        });

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "type": "videoURL",
                "url": "/stream/bW92aWUubXA0",
                "fileName": "movie.mp4",
                "fileId": "bW92aWUubXA0",
                "subtitleCount": 1,
                "subtitleNames": ["movie.srt"],
            })
        );
        assert_eq!(
            serde_json::to_value(ServerMessage::error("Video not found")).unwrap(),
            json!({"type": "error", "message": "Video not found"})
        );
    }
}
