//! Content the simulated swarm "downloads".
//!
//! A file is seeded from `seed_dir/<relative path>` when such a file exists
//! with exactly the declared length. Anything else is filled with a
//! deterministic pattern so repeated reads are byte-identical.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use super::FileHandle;

/// Deterministic byte at `offset` of the file at `file_index`.
pub fn pattern_byte(file_index: usize, offset: u64) -> u8 {
    let mixed = offset ^ (offset >> 9) ^ (offset >> 17) ^ (file_index as u64).wrapping_mul(0x9e);
    (mixed.wrapping_mul(31) & 0xff) as u8
}

/// Fills `buf` with the pattern starting at `offset`.
pub fn fill_pattern(file_index: usize, offset: u64, buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte = pattern_byte(file_index, offset + i as u64);
    }
}

/// Origin of one file's bytes.
pub enum ContentSource {
    /// Real file from the seed directory
    Seed(File),
    /// Generated pattern
    Pattern { file_index: usize },
}

impl ContentSource {
    /// Picks the seed file for `file` if one matches, else the pattern.
    pub async fn open(seed_dir: Option<&Path>, torrent_name: &str, file: &FileHandle) -> Self {
        let Some(seed_dir) = seed_dir else {
            return Self::Pattern {
                file_index: file.index,
            };
        };

        for candidate in seed_candidates(seed_dir, torrent_name, file) {
            let Ok(metadata) = tokio::fs::metadata(&candidate).await else {
                continue;
            };
            if metadata.is_file() && metadata.len() == file.length {
                match File::open(&candidate).await {
                    Ok(handle) => {
                        debug!("Seeding {} from {}", file.path, candidate.display());
                        return Self::Seed(handle);
                    }
                    Err(e) => debug!("Cannot open seed {}: {}", candidate.display(), e),
                }
            }
        }

        Self::Pattern {
            file_index: file.index,
        }
    }

    /// Reads the bytes at `[offset, offset + buf.len())`.
    ///
    /// # Errors
    /// - `std::io::Error` - Seed file could not be read
    pub async fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        match self {
            Self::Seed(file) => {
                file.seek(SeekFrom::Start(offset)).await?;
                file.read_exact(buf).await?;
                Ok(())
            }
            Self::Pattern { file_index } => {
                fill_pattern(*file_index, offset, buf);
                Ok(())
            }
        }
    }
}

/// Seed lookup order: full relative path, then the path without the torrent
/// directory, then the bare file name.
fn seed_candidates(seed_dir: &Path, torrent_name: &str, file: &FileHandle) -> Vec<PathBuf> {
    let mut candidates = vec![seed_dir.join(&file.path)];
    if let Some(stripped) = file.path.strip_prefix(&format!("{torrent_name}/")) {
        candidates.push(seed_dir.join(stripped));
    }
    candidates.push(seed_dir.join(&file.name));
    candidates.dedup();
    candidates
}
