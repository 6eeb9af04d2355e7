use crate::{
    error::{DeliveryError, ErrorBody, Result},
    metrics,
    model::SignedUrlEntry,
    server::{
        extract::{ClientAddr, Viewer},
        state::AppState,
    },
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub success: bool,
    #[serde(flatten)]
    pub entry: SignedUrlEntry,
}

impl From<SignedUrlEntry> for SignedUrlResponse {
    fn from(entry: SignedUrlEntry) -> Self {
        Self {
            success: true,
            entry,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub lecture_ids: Vec<String>,
}

/// One lecture's outcome in a batch: the single-lecture success shape or
/// the error body.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Issued(SignedUrlResponse),
    Failed(ErrorBody),
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub success: bool,
    pub results: BTreeMap<String, BatchItem>,
}

/// Signed playback URL for one lecture
pub async fn get_signed_url(
    Path((course_id, lecture_id)): Path<(String, String)>,
    State(state): State<AppState>,
    viewer: Viewer,
    ClientAddr(client): ClientAddr,
) -> Result<Json<SignedUrlResponse>> {
    let start = Instant::now();
    info!(
        "Signed URL request: course {} lecture {} viewer {:?}",
        course_id,
        lecture_id,
        viewer.id()
    );

    let result = state
        .delivery
        .get_video_url(viewer.id(), &client, &course_id, &lecture_id)
        .await;

    let status = result.as_ref().map_or_else(|e| e.status().as_u16(), |_| 200);
    metrics::record_request("signed_url", status);
    metrics::record_duration("signed_url", start);

    Ok(Json(result?.into()))
}

/// Signed playback URLs for several lectures of one course
pub async fn get_batch_signed_urls(
    Path(course_id): Path<String>,
    State(state): State<AppState>,
    viewer: Viewer,
    ClientAddr(client): ClientAddr,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let start = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let err = match viewer.id() {
                None => DeliveryError::Unauthenticated,
                Some(_) => DeliveryError::InvalidRequest(rejection.body_text()),
            };
            metrics::record_request("batch_signed_urls", err.status().as_u16());
            return Err(err);
        }
    };
    info!(
        "Batch signed URL request: course {} ({} lectures) viewer {:?}",
        course_id,
        request.lecture_ids.len(),
        viewer.id()
    );

    let result = state
        .delivery
        .get_batch(viewer.id(), &client, &course_id, &request.lecture_ids)
        .await;

    let status = result.as_ref().map_or_else(|e| e.status().as_u16(), |_| 200);
    metrics::record_request("batch_signed_urls", status);
    metrics::record_duration("batch_signed_urls", start);

    let results = result?
        .into_iter()
        .map(|(lecture_id, outcome)| {
            let item = match outcome {
                Ok(entry) => BatchItem::Issued(entry.into()),
                Err(e) => BatchItem::Failed(e.to_body()),
            };
            (lecture_id, item)
        })
        .collect();

    Ok(Json(BatchResponse {
        success: true,
        results,
    }))
}
