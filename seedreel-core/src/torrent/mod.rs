//! Torrent identity and source parsing
//!
//! Only as much of the BitTorrent format as the session layer needs: info
//! hashes, `.torrent` descriptors and magnet locators.

pub mod parsing;

use std::fmt;

pub use parsing::{
    BencodeParser, MagnetLink, MagnetParser, TorrentFile, TorrentMetadata, is_safe_path_component,
};

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary from a torrent file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Parses a 40 character hex string.
    ///
    /// # Errors
    /// - `TorrentError::InvalidMagnetLink` - Wrong length or non-hex characters
    pub fn from_hex(hex_str: &str) -> Result<Self, TorrentError> {
        let bytes = hex::decode(hex_str).map_err(|e| TorrentError::InvalidMagnetLink {
            reason: format!("Invalid info hash {hex_str}: {e}"),
        })?;
        let hash: [u8; 20] = bytes
            .try_into()
            .map_err(|_| TorrentError::InvalidMagnetLink {
                reason: format!("Invalid hash length: {} (expected 40)", hex_str.len()),
            })?;
        Ok(Self(hash))
    }

    /// Parses a 32 character RFC 4648 base32 string, as found in older
    /// magnet links.
    ///
    /// # Errors
    /// - `TorrentError::InvalidMagnetLink` - Wrong length or characters
    ///   outside the base32 alphabet
    pub fn from_base32(encoded: &str) -> Result<Self, TorrentError> {
        let invalid = || TorrentError::InvalidMagnetLink {
            reason: format!("Invalid base32 info hash {encoded}"),
        };
        if encoded.len() != 32 {
            return Err(invalid());
        }

        let mut hash = [0u8; 20];
        let mut buffer = 0u64;
        let mut bits = 0;
        let mut written = 0;
        for c in encoded.bytes() {
            let value = match c.to_ascii_uppercase() {
                c @ b'A'..=b'Z' => c - b'A',
                c @ b'2'..=b'7' => c - b'2' + 26,
                _ => return Err(invalid()),
            };
            buffer = (buffer << 5) | u64::from(value);
            bits += 5;
            if bits >= 8 {
                bits -= 8;
                hash[written] = (buffer >> bits) as u8;
                written += 1;
            }
        }
        Ok(Self(hash))
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Errors raised while parsing torrent sources.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TorrentError {
    #[error("Failed to parse torrent file: {reason}")]
    InvalidTorrentFile { reason: String },

    #[error("Invalid magnet link: {reason}")]
    InvalidMagnetLink { reason: String },
}
