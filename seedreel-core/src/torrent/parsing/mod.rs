//! Descriptor and locator parsing.
//!
//! Torrent metadata extraction using bencode-rs and magnet-url crates.

pub mod bencode;
pub mod magnet;
pub mod types;

pub use bencode::BencodeParser;
pub use magnet::MagnetParser;
pub use types::{MagnetLink, TorrentFile, TorrentMetadata, is_safe_path_component};
