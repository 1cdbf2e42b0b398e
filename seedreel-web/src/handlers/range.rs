//! HTTP Range responses for media streaming
//!
//! Turns a [`MediaStream`] into a `200 OK` or `206 Partial Content` response
//! whose body is pulled from the engine as the client reads it.

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use seedreel_core::streaming::MediaStream;

use crate::error::ApiError;

/// Extracts the `Range` header value.
///
/// Returns None if no range header is present or it is not valid UTF-8.
pub fn extract_range_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::RANGE)
        .and_then(|range| range.to_str().ok())
}

/// Builds the streaming response for `stream`.
///
/// With `head_only` the headers are identical but the body is empty and the
/// engine read is never polled.
///
/// # Errors
/// - `ApiError::Response` - A header value could not be encoded
pub fn build_range_response(stream: MediaStream, head_only: bool) -> Result<Response, ApiError> {
    let mut response = Response::builder()
        .header(header::CONTENT_TYPE, stream.content_type.as_str())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, stream.content_length())
        .header(header::CACHE_CONTROL, "no-cache");

    response = match stream.content_range() {
        Some(content_range) => response
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, content_range),
        None => response.status(StatusCode::OK),
    };

    let body = if head_only {
        Body::empty()
    } else {
        Body::from_stream(stream.body)
    };

    Ok(response.body(body)?)
}
