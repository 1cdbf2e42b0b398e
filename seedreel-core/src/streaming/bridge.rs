//! Byte-range reads of a session's primary file.

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, warn};

use super::range::{ByteRange, parse_range_header};
use crate::engine::ByteStream;
use crate::session::{SessionError, SessionRegistry};

/// A primary-file read ready to become an HTTP response.
pub struct MediaStream {
    /// `Some` when a `Range` header was honoured.
    pub range: Option<ByteRange>,
    /// Declared length of the whole file
    pub total: u64,
    pub content_type: String,
    pub body: ByteStream,
}

impl MediaStream {
    /// True for `206 Partial Content`.
    pub fn is_partial(&self) -> bool {
        self.range.is_some()
    }

    /// Bytes the body will carry.
    pub fn content_length(&self) -> u64 {
        self.range.map_or(self.total, |range| range.length())
    }

    /// `Content-Range` value for a partial response.
    pub fn content_range(&self) -> Option<String> {
        self.range.map(|range| range.content_range(self.total))
    }
}

/// Serves the primary file of `Active` sessions.
pub struct RangeStreamBridge<'a> {
    registry: &'a SessionRegistry,
}

impl<'a> RangeStreamBridge<'a> {
    pub fn new(registry: &'a SessionRegistry) -> Self {
        Self { registry }
    }

    /// Opens a read of session `id`'s primary file.
    ///
    /// Without a usable `Range` header the whole file is read. Dropping the
    /// returned body cancels the read; a read error after that ends the body
    /// early and is logged.
    ///
    /// # Errors
    /// - `SessionError::SessionNotFound` - Unknown or retiring session
    /// - `SessionError::RangeUnsatisfiable` - Range starts past the end
    /// - `SessionError::EngineFailure` - Engine refused the read
    pub fn handle(&self, id: &str, range_header: Option<&str>) -> Result<MediaStream, SessionError> {
        let session = self
            .registry
            .active(id)
            .ok_or_else(|| SessionError::SessionNotFound { id: id.to_string() })?;
        let file = session.primary();
        let total = file.length;

        let range = match range_header.and_then(parse_range_header) {
            Some(spec) => Some(spec.resolve(total)?),
            None => None,
        };
        let span = range.or_else(|| {
            (total > 0).then(|| ByteRange {
                start: 0,
                end: total - 1,
            })
        });

        let body = match span {
            Some(span) => {
                debug!(
                    "Streaming {} bytes {}-{} of {}",
                    file.name, span.start, span.end, total
                );
                let read = session
                    .torrent()
                    .read(file, span.start, span.end)
                    .map_err(SessionError::EngineFailure)?;
                log_read_errors(read, id.to_string())
            }
            None => stream::empty().boxed(),
        };

        Ok(MediaStream {
            range,
            total,
            content_type: content_type_for(&file.name),
            body,
        })
    }
}

/// MIME type for a media file name.
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub(crate) fn log_read_errors(body: ByteStream, id: String) -> ByteStream {
    body.inspect_err(move |e| warn!("Read for session {} ended early: {}", id, e))
        .boxed()
}
