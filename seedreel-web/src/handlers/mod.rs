//! HTTP request handlers organized by functionality

pub mod health;
pub mod range;
pub mod streaming;
pub mod subtitles;

pub use health::{HealthReport, health};
pub use range::{build_range_response, extract_range_header};
pub use streaming::stream_media;
pub use subtitles::serve_caption;
