use crate::server::state::AppState;
use crate::storage::MediaError;
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub expires: i64,
    pub token: String,
}

/// Serve an object from the in-process store through its presigned URL.
///
/// With the S3 backend the URLs point at the provider and this route
/// answers 404.
pub async fn serve_media(
    Path(key): Path<String>,
    Query(query): Query<MediaQuery>,
    State(state): State<AppState>,
) -> Response {
    let Some(media) = state.media.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match media.open(&key, query.expires, &query.token) {
        Ok(object) => (
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        Err(e) => {
            debug!("Media request for {} refused: {}", key, e);
            let status = match e {
                MediaError::NotFound => StatusCode::NOT_FOUND,
                MediaError::Expired | MediaError::InvalidToken => StatusCode::FORBIDDEN,
            };
            status.into_response()
        }
    }
}
