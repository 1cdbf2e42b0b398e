//! Picks the streamed file and its captions from a torrent's file set.

use std::path::Path;

use crate::engine::FileHandle;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mkv"];
const CAPTION_EXTENSIONS: &[&str] = &["srt", "vtt"];

/// What a file is, judged by its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Caption,
    Other,
}

/// Classifies a file name by case-insensitive extension.
pub fn classify(name: &str) -> MediaKind {
    let Some(extension) = Path::new(name).extension().and_then(|e| e.to_str()) else {
        return MediaKind::Other;
    };
    let extension = extension.to_ascii_lowercase();

    if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Video
    } else if CAPTION_EXTENSIONS.contains(&extension.as_str()) {
        MediaKind::Caption
    } else {
        MediaKind::Other
    }
}

/// Files picked for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSelection {
    pub primary: FileHandle,
    pub captions: Vec<FileHandle>,
}

/// Largest video file as primary, every caption file in order.
///
/// Returns `None` when the set holds no video file. Ties between equally
/// large videos go to the first one seen.
pub fn select(files: &[FileHandle]) -> Option<MediaSelection> {
    let mut primary: Option<&FileHandle> = None;
    let mut captions = Vec::new();

    for file in files {
        match classify(&file.name) {
            MediaKind::Video => {
                if primary.is_none_or(|best| file.length > best.length) {
                    primary = Some(file);
                }
            }
            MediaKind::Caption => captions.push(file.clone()),
            MediaKind::Other => {}
        }
    }

    primary.map(|primary| MediaSelection {
        primary: primary.clone(),
        captions,
    })
}
