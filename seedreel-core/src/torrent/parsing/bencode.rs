//! Bencode parsing logic and info hash calculation

use sha1::{Digest, Sha1};

use super::types::{TorrentFile, TorrentMetadata, is_safe_path_component};
use crate::torrent::{InfoHash, TorrentError};

type BencodeDict<'a> = std::collections::HashMap<&'a [u8], bencode_rs::Value<'a>>;
type ParseResult<T> = Result<T, TorrentError>;

/// Bencode parsing utilities for torrent metadata extraction.
pub struct BencodeParser;

impl BencodeParser {
    /// Parse bencode data and extract torrent metadata
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - If bencode parsing or metadata extraction failed
    pub fn parse_bencode_data(torrent_bytes: &[u8]) -> Result<TorrentMetadata, TorrentError> {
        let parsed = bencode_rs::Value::parse(torrent_bytes).map_err(|e| invalid(format!(
            "Bencode parsing failed: {e:?}"
        )))?;

        let Some(root) = parsed.first() else {
            return Err(invalid("Empty bencode data"));
        };

        if let bencode_rs::Value::Dictionary(dict) = root {
            Self::extract_metadata_from_dict(dict, torrent_bytes)
        } else {
            Err(invalid("Root element must be dictionary"))
        }
    }

    fn extract_metadata_from_dict(
        dict: &BencodeDict<'_>,
        original_data: &[u8],
    ) -> ParseResult<TorrentMetadata> {
        let info_dict = dict
            .get(b"info".as_slice())
            .ok_or_else(|| invalid("Missing 'info' field"))?;

        let bencode_rs::Value::Dictionary(info_dict_map) = info_dict else {
            return Err(invalid("Info field must be dictionary"));
        };

        let info_hash = Self::calculate_info_hash(original_data)?;

        let name = Self::extract_bytes_as_string(info_dict_map, b"name")?;
        if !is_safe_path_component(&name) {
            return Err(invalid(format!("Unsafe torrent name: {name:?}")));
        }
        let piece_length = Self::extract_integer(info_dict_map, b"piece length")?;
        if piece_length <= 0 || piece_length > i64::from(u32::MAX) {
            return Err(invalid(format!("Invalid piece length: {piece_length}")));
        }

        let pieces_bytes = Self::extract_bytes(info_dict_map, b"pieces")?;
        if pieces_bytes.len() % 20 != 0 {
            return Err(invalid("Invalid pieces length"));
        }

        let (files, total_length) =
            if let Ok(length) = Self::extract_integer(info_dict_map, b"length") {
                let length = non_negative(length, "length")?;
                let files = vec![TorrentFile {
                    path: vec![name.clone()],
                    length,
                }];
                (files, length)
            } else if let Some(bencode_rs::Value::List(files_list)) =
                info_dict_map.get(b"files".as_slice())
            {
                let (files, total) = Self::extract_files_info(files_list)?;
                // Multi-file torrents nest every path under the torrent name.
                let files = files
                    .into_iter()
                    .map(|file| {
                        let mut path = Vec::with_capacity(file.path.len() + 1);
                        path.push(name.clone());
                        path.extend(file.path);
                        TorrentFile {
                            path,
                            length: file.length,
                        }
                    })
                    .collect();
                (files, total)
            } else {
                return Err(invalid("Missing 'files' or 'length' field"));
            };

        Ok(TorrentMetadata {
            info_hash,
            name,
            piece_length: piece_length as u32,
            piece_count: (pieces_bytes.len() / 20) as u32,
            total_length,
            files,
            announce_urls: Self::extract_announce_urls(dict),
        })
    }

    /// Calculate SHA1 hash of the raw info dictionary bytes
    fn calculate_info_hash(original_data: &[u8]) -> Result<InfoHash, TorrentError> {
        let info_start = original_data
            .windows(b"4:info".len())
            .position(|window| window == b"4:info")
            .ok_or_else(|| invalid("Could not find info dictionary in data"))?;

        let info_data_start = info_start + 6;
        let info_dict_end = Self::find_bencode_dictionary_end(&original_data[info_data_start..])?;
        let info_dict_bytes = &original_data[info_data_start..info_data_start + info_dict_end];

        let mut hasher = Sha1::new();
        hasher.update(info_dict_bytes);
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&hasher.finalize());

        Ok(InfoHash::new(hash))
    }

    /// Find the end position of a bencode dictionary
    ///
    /// # Errors
    ///
    /// - `TorrentError::InvalidTorrentFile` - If invalid bencode dictionary format
    pub fn find_bencode_dictionary_end(data: &[u8]) -> Result<usize, TorrentError> {
        if data.first() != Some(&b'd') {
            return Err(invalid("Expected dictionary start"));
        }

        let mut pos = 1;
        let mut depth = 1;

        while pos < data.len() && depth > 0 {
            match data[pos] {
                b'd' | b'l' => {
                    depth += 1;
                    pos += 1;
                }
                b'e' => {
                    depth -= 1;
                    pos += 1;
                }
                b'i' => {
                    pos += 1;
                    while pos < data.len() && data[pos] != b'e' {
                        pos += 1;
                    }
                    pos += 1;
                }
                b'0'..=b'9' => {
                    let start = pos;
                    while pos < data.len() && data[pos] != b':' {
                        pos += 1;
                    }
                    if pos >= data.len() {
                        return Err(invalid("Invalid string format"));
                    }

                    let length: usize = std::str::from_utf8(&data[start..pos])
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| invalid("Invalid string length"))?;

                    pos += 1 + length;
                }
                _ => return Err(invalid("Invalid bencode character")),
            }
        }

        if depth != 0 || pos > data.len() {
            return Err(invalid("Incomplete bencode dictionary"));
        }

        Ok(pos)
    }

    fn extract_bytes_as_string(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<String> {
        let bytes = Self::extract_bytes(dict, key)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            invalid(format!(
                "Invalid UTF-8 in field: {:?}",
                String::from_utf8_lossy(key)
            ))
        })
    }

    fn extract_bytes<'a>(dict: &'a BencodeDict<'_>, key: &[u8]) -> ParseResult<&'a [u8]> {
        match dict.get(key) {
            Some(bencode_rs::Value::Bytes(bytes)) => Ok(bytes),
            _ => Err(invalid(format!(
                "Missing or invalid field: {:?}",
                String::from_utf8_lossy(key)
            ))),
        }
    }

    fn extract_integer(dict: &BencodeDict<'_>, key: &[u8]) -> ParseResult<i64> {
        match dict.get(key) {
            Some(bencode_rs::Value::Integer(value)) => Ok(*value),
            _ => Err(invalid(format!(
                "Missing or invalid integer field: {:?}",
                String::from_utf8_lossy(key)
            ))),
        }
    }

    fn extract_files_info(files_list: &[bencode_rs::Value<'_>]) -> ParseResult<(Vec<TorrentFile>, u64)> {
        let mut files = Vec::with_capacity(files_list.len());
        let mut total_length = 0u64;

        for file_value in files_list {
            let bencode_rs::Value::Dictionary(file_dict) = file_value else {
                return Err(invalid("Invalid file entry type"));
            };

            let length = non_negative(Self::extract_integer(file_dict, b"length")?, "length")?;
            total_length += length;

            let Some(bencode_rs::Value::List(path_list)) = file_dict.get(b"path".as_slice()) else {
                return Err(invalid("Missing or invalid path in file"));
            };

            let mut path = Vec::with_capacity(path_list.len());
            for component in path_list {
                let bencode_rs::Value::Bytes(component) = component else {
                    return Err(invalid("Invalid path component type"));
                };
                let component = String::from_utf8(component.to_vec())
                    .map_err(|_| invalid("Invalid UTF-8 in file path"))?;
                if !is_safe_path_component(&component) {
                    return Err(invalid(format!("Unsafe path component: {component:?}")));
                }
                path.push(component);
            }
            if path.is_empty() {
                return Err(invalid("Empty file path"));
            }

            files.push(TorrentFile { path, length });
        }

        Ok((files, total_length))
    }

    fn extract_announce_urls(dict: &BencodeDict<'_>) -> Vec<String> {
        let mut announce_urls = Vec::new();

        if let Ok(announce) = Self::extract_bytes_as_string(dict, b"announce") {
            announce_urls.push(announce);
        }

        if let Some(bencode_rs::Value::List(announce_list)) = dict.get(b"announce-list".as_slice())
        {
            for tier in announce_list {
                if let bencode_rs::Value::List(tier_urls) = tier {
                    for url_value in tier_urls {
                        if let bencode_rs::Value::Bytes(url_bytes) = url_value
                            && let Ok(url) = String::from_utf8(url_bytes.to_vec())
                            && !announce_urls.contains(&url)
                        {
                            announce_urls.push(url);
                        }
                    }
                }
            }
        }

        announce_urls
    }
}

fn invalid(reason: impl Into<String>) -> TorrentError {
    TorrentError::InvalidTorrentFile {
        reason: reason.into(),
    }
}

fn non_negative(value: i64, field: &str) -> ParseResult<u64> {
    u64::try_from(value).map_err(|_| invalid(format!("Negative {field}: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINGLE_FILE: &[u8] = b"d8:announce9:test:80804:infod6:lengthi1000e4:name9:movie.mp412:piece lengthi32768e6:pieces20:12345678901234567890ee";

    #[test]
    fn test_single_file_torrent() {
        let metadata = BencodeParser::parse_bencode_data(SINGLE_FILE).unwrap();
        assert_eq!(metadata.name, "movie.mp4");
        assert_eq!(metadata.piece_length, 32768);
        assert_eq!(metadata.piece_count, 1);
        assert_eq!(metadata.total_length, 1000);
        assert_eq!(metadata.files.len(), 1);
        assert_eq!(metadata.files[0].path, vec!["movie.mp4"]);
        assert_eq!(metadata.announce_urls, vec!["test:8080"]);
    }

    #[test]
    fn test_multi_file_torrent_nests_paths_under_name() {
        let data = b"d4:infod5:filesld6:lengthi500e4:pathl9:video.mkveed6:lengthi20e4:pathl4:subs8:subs.srteee4:name4:Show12:piece lengthi16384e6:pieces20:abcdefghijabcdefghijee";
        let metadata = BencodeParser::parse_bencode_data(data).unwrap();

        assert_eq!(metadata.total_length, 520);
        assert_eq!(metadata.files.len(), 2);
        assert_eq!(metadata.files[0].relative_path(), "Show/video.mkv");
        assert_eq!(metadata.files[1].relative_path(), "Show/subs/subs.srt");
        assert_eq!(metadata.files[1].name(), "subs.srt");
    }

    #[test]
    fn test_info_hash_is_stable() {
        let a = BencodeParser::parse_bencode_data(SINGLE_FILE).unwrap();
        let b = BencodeParser::parse_bencode_data(SINGLE_FILE).unwrap();
        assert_eq!(a.info_hash, b.info_hash);
    }

    #[test]
    fn test_rejects_non_dictionary_root() {
        assert!(BencodeParser::parse_bencode_data(b"invalid torrent data").is_err());
        assert!(BencodeParser::parse_bencode_data(b"li1ee").is_err());
    }

    #[test]
    fn test_rejects_missing_info() {
        let result = BencodeParser::parse_bencode_data(b"d8:announce9:test:8080e");
        assert!(matches!(
            result,
            Err(TorrentError::InvalidTorrentFile { .. })
        ));
    }

    #[test]
    fn test_rejects_path_traversal() {
        let data = b"d4:infod5:filesld6:lengthi5e4:pathl2:..6:escapeeee4:name1:x12:piece lengthi16384e6:pieces20:abcdefghijabcdefghijee";
        assert!(BencodeParser::parse_bencode_data(data).is_err());
    }

    #[test]
    fn test_rejects_unsafe_torrent_name() {
        for name in ["/etc/x.mp4", "..", "../x.mp4", "dir\\x.mp4", ""] {
            let data = format!(
                "d4:infod6:lengthi10e4:name{}:{name}12:piece lengthi16384e6:pieces20:abcdefghijabcdefghijee",
                name.len()
            );
            let result = BencodeParser::parse_bencode_data(data.as_bytes());
            assert!(
                matches!(result, Err(TorrentError::InvalidTorrentFile { .. })),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_find_dictionary_end() {
        let data = b"d3:keyi42ee-trailing";
        assert_eq!(BencodeParser::find_bencode_dictionary_end(data).unwrap(), 11);
        assert!(BencodeParser::find_bencode_dictionary_end(b"d3:key").is_err());
    }
}
