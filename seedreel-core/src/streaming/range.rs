//! HTTP `Range` header handling
//!
//! Only single ranges are honoured. A multi-range or malformed header is
//! treated as absent and the whole file is served.

use crate::session::SessionError;

/// A parsed single `bytes=` range, not yet checked against a length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-end` or `bytes=start-`
    FromTo { start: u64, end: Option<u64> },
    /// `bytes=-length`, the last `length` bytes
    Suffix { length: u64 },
}

/// Inclusive byte span inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered.
    pub fn length(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value for a file of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Parses a `Range` header value.
///
/// Returns `None` for anything that is not a single byte range.
///
/// # Examples
/// ```
/// use seedreel_core::streaming::{RangeSpec, parse_range_header};
///
/// assert_eq!(
///     parse_range_header("bytes=100-199"),
///     Some(RangeSpec::FromTo { start: 100, end: Some(199) })
/// );
/// assert_eq!(parse_range_header("bytes=0-1,5-9"), None);
/// ```
pub fn parse_range_header(header: &str) -> Option<RangeSpec> {
    let header = header.trim();
    let spec = header
        .get(..6)
        .filter(|unit| unit.eq_ignore_ascii_case("bytes="))
        .map(|_| header[6..].trim())?;
    if spec.contains(',') {
        return None;
    }

    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());

    if start.is_empty() {
        return end
            .parse::<u64>()
            .ok()
            .map(|length| RangeSpec::Suffix { length });
    }

    let start = start.parse::<u64>().ok()?;
    let end = if end.is_empty() {
        None
    } else {
        Some(end.parse::<u64>().ok()?)
    };
    Some(RangeSpec::FromTo { start, end })
}

impl RangeSpec {
    /// Checks the range against a file of `total` bytes.
    ///
    /// An end past the file is clamped to the last byte.
    ///
    /// # Errors
    /// - `SessionError::RangeUnsatisfiable` - Start at or past the end of the
    ///   file, start after end, or an empty suffix
    pub fn resolve(self, total: u64) -> Result<ByteRange, SessionError> {
        let unsatisfiable = SessionError::RangeUnsatisfiable { total };
        if total == 0 {
            return Err(unsatisfiable);
        }
        let last = total - 1;

        match self {
            RangeSpec::FromTo { start, end } => {
                let end = end.unwrap_or(last);
                if start > end || start >= total {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange {
                    start,
                    end: end.min(last),
                })
            }
            RangeSpec::Suffix { length } => {
                if length == 0 {
                    return Err(unsatisfiable);
                }
                Ok(ByteRange {
                    start: total.saturating_sub(length),
                    end: last,
                })
            }
        }
    }
}
