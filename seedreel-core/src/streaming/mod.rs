//! Streaming bridges from sessions to HTTP-shaped responses
//!
//! Transport-agnostic: the bridges produce status, headers and a body
//! stream, and the web layer turns them into responses.

pub mod bridge;
pub mod captions;
pub mod range;
pub mod vtt;

pub use bridge::{MediaStream, RangeStreamBridge, content_type_for};
pub use captions::{CAPTION_CONTENT_TYPE, CaptionBridge, CaptionStream};
pub use range::{ByteRange, RangeSpec, parse_range_header};
pub use vtt::{SrtToVtt, srt_to_vtt};
