//! Primary media streaming endpoint.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use tracing::debug;

use super::range::{build_range_response, extract_range_header};
use crate::error::ApiError;
use crate::server::AppState;

/// `GET`/`HEAD /stream/{file_id}`
///
/// Each request opens its own read; a client that disconnects only drops
/// that read and leaves the session untouched.
///
/// # Errors
/// - `ApiError::Session` - Unknown session, unsatisfiable range or engine failure
pub async fn stream_media(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let range = extract_range_header(&headers);
    debug!("{} /stream/{} range={:?}", method, file_id, range);

    let stream = state.manager.open_stream(&file_id, range)?;
    build_range_response(stream, method == Method::HEAD)
}
