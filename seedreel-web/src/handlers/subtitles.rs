//! Caption endpoint.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use seedreel_core::SessionError;

use crate::error::ApiError;
use crate::server::AppState;

/// `GET /subtitles/{file_id}/{index}`
///
/// An index that is not a number is reported like one past the end.
///
/// # Errors
/// - `ApiError::Session` - Unknown session or caption index
pub async fn serve_caption(
    State(state): State<AppState>,
    Path((file_id, index)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let index = index
        .parse::<usize>()
        .map_err(|_| SessionError::CaptionNotFound {
            id: file_id.clone(),
            index: usize::MAX,
        })?;

    let caption = state.manager.open_caption(&file_id, index)?;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, caption.content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(caption.body))?;

    Ok(response)
}
