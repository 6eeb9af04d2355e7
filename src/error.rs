use crate::storage::StorageError;
use crate::store::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

/// Every way a playback request can fail.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Please sign in to watch this lecture")]
    Unauthenticated,

    #[error("Too many requests, try again shortly")]
    RateLimited,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Enroll in this course to continue")]
    AccessDenied,

    #[error("Complete payment to continue")]
    PaymentRequired,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Entitlement could not be determined (store down or timed out).
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;

impl From<StoreError> for DeliveryError {
    fn from(e: StoreError) -> Self {
        DeliveryError::Unavailable(e.to_string())
    }
}

/// JSON error body, also used per lecture in batch responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
}

impl DeliveryError {
    pub fn status(&self) -> StatusCode {
        match self {
            DeliveryError::Unauthenticated => StatusCode::UNAUTHORIZED,
            DeliveryError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            DeliveryError::NotFound(_) => StatusCode::NOT_FOUND,
            DeliveryError::AccessDenied | DeliveryError::PaymentRequired => StatusCode::FORBIDDEN,
            DeliveryError::Storage(_) => StatusCode::BAD_GATEWAY,
            DeliveryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            DeliveryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            DeliveryError::Unauthenticated => "UNAUTHENTICATED",
            DeliveryError::RateLimited => "RATE_LIMITED",
            DeliveryError::NotFound(_) => "NOT_FOUND",
            DeliveryError::AccessDenied => "ACCESS_DENIED",
            DeliveryError::PaymentRequired => "PAYMENT_REQUIRED",
            DeliveryError::Storage(_) => "STORAGE_ERROR",
            DeliveryError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            DeliveryError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }

    /// Message safe to show to the viewer. Upstream detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            DeliveryError::Storage(e) => {
                error!(error = %e, "Storage failure during video delivery");
                "Video temporarily unavailable, try again later".to_string()
            }
            DeliveryError::Unavailable(detail) => {
                error!(error = %detail, "Entitlement resolution failed");
                "Service temporarily unavailable, try again later".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            success: false,
            error: self.public_message(),
            code: self.code(),
        }
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_body())).into_response()
    }
}
