//! Caption files of a session, always served as WebVTT.

use futures::{StreamExt, stream};

use super::bridge::log_read_errors;
use super::vtt::srt_to_vtt;
use crate::engine::ByteStream;
use crate::session::{SessionError, SessionRegistry};

pub const CAPTION_CONTENT_TYPE: &str = "text/vtt";

/// A caption read ready to become an HTTP response.
pub struct CaptionStream {
    pub file_name: String,
    pub content_type: &'static str,
    pub body: ByteStream,
}

/// Serves caption files of `Active` sessions by index.
pub struct CaptionBridge<'a> {
    registry: &'a SessionRegistry,
}

impl<'a> CaptionBridge<'a> {
    pub fn new(registry: &'a SessionRegistry) -> Self {
        Self { registry }
    }

    /// Opens caption `index` of session `id`. SRT files are converted on
    /// the fly.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` - Unknown or retiring session
    /// - `SessionError::CaptionNotFound` - No caption at `index`
    /// - `SessionError::EngineFailure` - Engine refused the read
    pub fn handle(&self, id: &str, index: usize) -> Result<CaptionStream, SessionError> {
        let session = self
            .registry
            .active(id)
            .ok_or_else(|| SessionError::SessionNotFound { id: id.to_string() })?;
        let caption = session
            .captions()
            .get(index)
            .ok_or_else(|| SessionError::CaptionNotFound {
                id: id.to_string(),
                index,
            })?;

        let raw = if caption.length == 0 {
            stream::empty().boxed()
        } else {
            session
                .torrent()
                .read(caption, 0, caption.length - 1)
                .map_err(SessionError::EngineFailure)?
        };

        let body = if is_srt(&caption.name) {
            srt_to_vtt(raw)
        } else {
            raw
        };

        Ok(CaptionStream {
            file_name: caption.name.clone(),
            content_type: CAPTION_CONTENT_TYPE,
            body: log_read_errors(body, id.to_string()),
        })
    }
}

fn is_srt(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, extension)| extension.eq_ignore_ascii_case("srt"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use futures::TryStreamExt;

    use super::*;
    use crate::engine::{Engine, MockEngine, MockFile, TorrentSource};
    use crate::session::{Session, select};

    async fn registry() -> (SessionRegistry, String) {
        let torrent = MockEngine::new(vec![
            MockFile::new("movie.mp4", 100),
            MockFile::with_data("en.SRT", &b"1\r\n00:00:01,000 --> 00:00:02,000\r\nHi\r\n"[..]),
            MockFile::with_data("de.vtt", &b"WEBVTT\n\nkeep,as,is\n"[..]),
        ])
        .add(TorrentSource::Descriptor(Bytes::from_static(b"x")))
        .await
        .unwrap();
        let selection = select(torrent.files()).unwrap();
        let session = Arc::new(Session::new(torrent, selection));
        let id = session.id().to_string();

        let registry = SessionRegistry::new();
        registry.admit(session);
        (registry, id)
    }

    async fn text(stream: CaptionStream) -> String {
        let chunks: Vec<Bytes> = stream.body.try_collect().await.unwrap();
        String::from_utf8(chunks.concat()).unwrap()
    }

    #[tokio::test]
    async fn test_srt_is_converted() {
        let (registry, id) = registry().await;
        let caption = CaptionBridge::new(&registry).handle(&id, 0).unwrap();

        assert_eq!(caption.content_type, "text/vtt");
        assert_eq!(caption.file_name, "en.SRT");
        assert_eq!(
            text(caption).await,
            "WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\nHi\n"
        );
    }

    #[tokio::test]
    async fn test_vtt_is_verbatim() {
        let (registry, id) = registry().await;
        let caption = CaptionBridge::new(&registry).handle(&id, 1).unwrap();
        assert_eq!(caption.content_type, "text/vtt");
        assert_eq!(text(caption).await, "WEBVTT\n\nkeep,as,is\n");
    }

    #[tokio::test]
    async fn test_index_out_of_range() {
        let (registry, id) = registry().await;
        let bridge = CaptionBridge::new(&registry);

        assert!(matches!(
            bridge.handle(&id, 2),
            Err(SessionError::CaptionNotFound { index: 2, .. })
        ));
        assert!(matches!(
            bridge.handle("missing", 0),
            Err(SessionError::SessionNotFound { .. })
        ));
    }
}
