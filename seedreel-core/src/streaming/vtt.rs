//! Streaming SRT to WebVTT conversion.
//!
//! Works line by line on raw bytes, so chunk boundaries may fall anywhere,
//! including inside a multi-byte character.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream;

use crate::engine::ByteStream;

const WEBVTT_HEADER: &[u8] = b"WEBVTT\n\n";
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// Incremental SRT to WebVTT converter.
#[derive(Debug, Default)]
pub struct SrtToVtt {
    pending: Vec<u8>,
    bom_checked: bool,
    header_written: bool,
}

impl SrtToVtt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes `chunk` and returns the converted complete lines so far.
    pub fn feed(&mut self, chunk: &[u8]) -> Bytes {
        self.pending.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.pending.len() < UTF8_BOM.len() {
                return Bytes::new();
            }
            self.strip_bom();
        }

        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Bytes::new();
        };

        let complete: Vec<u8> = self.pending.drain(..=last_newline).collect();
        let mut out = self.start_output();
        for line in complete[..complete.len() - 1].split(|&b| b == b'\n') {
            convert_line(line, &mut out);
        }
        Bytes::from(out)
    }

    /// Flushes whatever is left after the last chunk.
    pub fn finish(&mut self) -> Bytes {
        if !self.bom_checked {
            self.strip_bom();
        }
        let mut out = self.start_output();
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            convert_line(&rest, &mut out);
        }
        Bytes::from(out)
    }

    fn strip_bom(&mut self) {
        if self.pending.starts_with(UTF8_BOM) {
            self.pending.drain(..UTF8_BOM.len());
        }
        self.bom_checked = true;
    }

    fn start_output(&mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pending.len() + WEBVTT_HEADER.len());
        if !self.header_written {
            out.extend_from_slice(WEBVTT_HEADER);
            self.header_written = true;
        }
        out
    }
}

/// Appends `line` to `out` with `\r` dropped and timing commas turned into
/// dots.
fn convert_line(line: &[u8], out: &mut Vec<u8>) {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let is_timing = line.windows(3).any(|window| window == b"-->");

    for (i, &byte) in line.iter().enumerate() {
        let between_digits = i > 0
            && line[i - 1].is_ascii_digit()
            && line.get(i + 1).is_some_and(u8::is_ascii_digit);
        if is_timing && byte == b',' && between_digits {
            out.push(b'.');
        } else {
            out.push(byte);
        }
    }
    out.push(b'\n');
}

/// Converts an SRT body stream into a WebVTT body stream.
///
/// An error from `body` is passed on and ends the stream.
pub fn srt_to_vtt(body: ByteStream) -> ByteStream {
    stream::unfold(Some((body, SrtToVtt::new())), |state| async move {
        let (mut body, mut converter) = state?;
        loop {
            match body.next().await {
                Some(Ok(chunk)) => {
                    let out = converter.feed(&chunk);
                    if !out.is_empty() {
                        return Some((Ok(out), Some((body, converter))));
                    }
                }
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    let out = converter.finish();
                    return (!out.is_empty()).then_some((Ok(out), None));
                }
            }
        }
    })
    .boxed()
}
