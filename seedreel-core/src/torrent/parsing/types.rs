//! Core types and structures for torrent parsing

use super::super::InfoHash;

/// Complete metadata extracted from a torrent file.
///
/// Contains what the engine needs to lay files out on disk and report
/// piece-level progress.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentMetadata {
    pub info_hash: InfoHash,
    pub name: String,
    pub piece_length: u32,
    pub piece_count: u32,
    pub total_length: u64,
    pub files: Vec<TorrentFile>,
    pub announce_urls: Vec<String>,
}

impl TorrentMetadata {
    /// Builds single-file metadata, used when a locator carries both a
    /// display name and an exact length.
    pub fn single_file(info_hash: InfoHash, name: &str, length: u64, piece_length: u32) -> Self {
        let piece_count = length.div_ceil(u64::from(piece_length.max(1))) as u32;
        Self {
            info_hash,
            name: name.to_string(),
            piece_length,
            piece_count,
            total_length: length,
            files: vec![TorrentFile {
                path: vec![name.to_string()],
                length,
            }],
            announce_urls: Vec::new(),
        }
    }
}

/// Individual file within a torrent.
///
/// Represents a single file entry with its relative path components and
/// byte length.
#[derive(Debug, Clone, PartialEq)]
pub struct TorrentFile {
    pub path: Vec<String>,
    pub length: u64,
}

impl TorrentFile {
    /// Final path component, used as the display name.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    /// Relative path joined with `/`.
    pub fn relative_path(&self) -> String {
        self.path.join("/")
    }
}

/// True when `component` can be joined onto a directory without leaving it.
pub fn is_safe_path_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}

/// Magnet link components.
///
/// Parsed magnet URI containing minimal torrent metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub exact_length: Option<u64>,
    pub trackers: Vec<String>,
}
