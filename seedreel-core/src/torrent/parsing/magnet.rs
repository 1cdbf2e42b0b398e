//! Magnet link parsing utilities

use std::sync::LazyLock;

use regex::Regex;

use super::types::{MagnetLink, is_safe_path_component};
use crate::torrent::{InfoHash, TorrentError};

/// Exact-topic parameter carrying a v1 info hash, hex or base32 encoded.
static BTIH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[?&])xt=urn:btih:([0-9a-f]{40}|[a-z2-7]{32})(?:&|$)")
        .expect("btih pattern is a valid regex")
});

/// Magnet link parsing utilities.
pub struct MagnetParser;

impl MagnetParser {
    /// Checks whether `candidate` looks like a magnet link with a v1 info hash.
    ///
    /// This is the cheap gate run before any engine call.
    pub fn is_valid_locator(candidate: &str) -> bool {
        let trimmed = candidate.trim();
        has_magnet_scheme(trimmed) && BTIH_PATTERN.is_match(trimmed)
    }

    /// Parses magnet link to extract torrent information.
    ///
    /// # Errors
    /// - `TorrentError::InvalidMagnetLink` - Wrong scheme, malformed URI or
    ///   missing/invalid `xt=urn:btih:` hash
    pub fn parse_magnet_link(magnet_url: &str) -> Result<MagnetLink, TorrentError> {
        let magnet_url = magnet_url.trim();
        if !has_magnet_scheme(magnet_url) {
            return Err(TorrentError::InvalidMagnetLink {
                reason: "Expected magnet:? scheme".to_string(),
            });
        }

        let info_hash = Self::extract_info_hash(magnet_url)?;

        let magnet =
            magnet_url::Magnet::new(magnet_url).map_err(|e| TorrentError::InvalidMagnetLink {
                reason: format!("Malformed magnet URI: {e:?}"),
            })?;

        // A name that is not a plain file name cannot lay out a file.
        let display_name = magnet
            .display_name()
            .map(|name| decode_component(&name.replace('+', " ")))
            .filter(|name| is_safe_path_component(name));

        Ok(MagnetLink {
            info_hash,
            display_name,
            exact_length: Self::extract_exact_length(magnet_url),
            trackers: magnet.trackers().to_vec(),
        })
    }

    fn extract_info_hash(magnet_url: &str) -> Result<InfoHash, TorrentError> {
        let captures =
            BTIH_PATTERN
                .captures(magnet_url)
                .ok_or_else(|| TorrentError::InvalidMagnetLink {
                    reason: format!("Missing or invalid info hash in magnet link: {magnet_url}"),
                })?;
        let encoded = &captures[1];
        if encoded.len() == 32 {
            InfoHash::from_base32(encoded)
        } else {
            InfoHash::from_hex(encoded)
        }
    }

    /// `xl` (exact length) is optional and ignored when malformed.
    fn extract_exact_length(magnet_url: &str) -> Option<u64> {
        let (_, query) = magnet_url.split_once('?')?;
        query
            .split('&')
            .find_map(|param| param.strip_prefix("xl="))
            .and_then(|value| value.parse::<u64>().ok())
    }
}

fn has_magnet_scheme(candidate: &str) -> bool {
    candidate
        .get(..8)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("magnet:?"))
}

fn decode_component(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_valid_magnet_link() {
        let url = format!(
            "magnet:?xt=urn:btih:{HASH}&dn=Test%20Movie.mkv&xl=1048576&tr=http://tracker.example.com/announce"
        );
        let magnet = MagnetParser::parse_magnet_link(&url).unwrap();

        assert_eq!(magnet.info_hash.to_string(), HASH);
        assert_eq!(magnet.display_name.as_deref(), Some("Test Movie.mkv"));
        assert_eq!(magnet.exact_length, Some(1_048_576));
        assert_eq!(magnet.trackers, vec!["http://tracker.example.com/announce"]);
    }

    #[test]
    fn test_uppercase_hash_is_accepted() {
        let url = format!("magnet:?xt=urn:btih:{}", HASH.to_uppercase());
        assert!(MagnetParser::is_valid_locator(&url));
        let magnet = MagnetParser::parse_magnet_link(&url).unwrap();
        assert_eq!(magnet.info_hash.to_string(), HASH);
        assert_eq!(magnet.display_name, None);
        assert_eq!(magnet.exact_length, None);
    }

    #[test]
    fn test_base32_hash_is_accepted() {
        // HASH in base32
        let url = "magnet:?xt=urn:btih:AERUKZ4JVPG66AJDIVTYTK6N54ASGRLH&dn=clip.mp4";
        assert!(MagnetParser::is_valid_locator(url));
        let magnet = MagnetParser::parse_magnet_link(url).unwrap();
        assert_eq!(magnet.info_hash.to_string(), HASH);
    }

    #[test]
    fn test_rejects_wrong_scheme() {
        assert!(!MagnetParser::is_valid_locator("invalid://not-a-magnet"));
        assert!(matches!(
            MagnetParser::parse_magnet_link("http://example.com/?xt=urn:btih:abc"),
            Err(TorrentError::InvalidMagnetLink { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_or_short_hash() {
        assert!(!MagnetParser::is_valid_locator("magnet:?dn=movie.mp4"));
        assert!(!MagnetParser::is_valid_locator("magnet:?xt=urn:btih:abcdef"));
        assert!(MagnetParser::parse_magnet_link("magnet:?xt=urn:btih:abcdef").is_err());
    }

    #[test]
    fn test_display_name_with_path_is_dropped() {
        for dn in ["..%2F..%2Fescaped.mp4", "%2Fetc%2Fpasswd", "..", "a%5Cb.mp4"] {
            let url = format!("magnet:?xt=urn:btih:{HASH}&dn={dn}&xl=64");
            let magnet = MagnetParser::parse_magnet_link(&url).unwrap();
            assert_eq!(magnet.display_name, None, "{dn}");
            assert_eq!(magnet.exact_length, Some(64));
        }
    }

    #[test]
    fn test_malformed_exact_length_is_ignored() {
        let url = format!("magnet:?xt=urn:btih:{HASH}&xl=lots");
        let magnet = MagnetParser::parse_magnet_link(&url).unwrap();
        assert_eq!(magnet.exact_length, None);
    }
}
