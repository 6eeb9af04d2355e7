use crate::server::extract::InternalCaller;
use crate::server::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
};
use tracing::info;

/// Drop the cached access decision for a viewer in a course.
///
/// Called by enrollment and payment workflows after access changes, so a
/// fresh grant is visible on the next request instead of after the TTL.
/// Cached signed URLs are left alone; they expire on their own shortly.
/// Requires the internal API token.
pub async fn invalidate_access(
    _caller: InternalCaller,
    Path((viewer_id, course_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> StatusCode {
    info!("Access invalidated for viewer {} in course {}", viewer_id, course_id);
    state.delivery.invalidate_access(&viewer_id, &course_id).await;
    StatusCode::NO_CONTENT
}
