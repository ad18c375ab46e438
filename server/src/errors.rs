use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hybrid_core::SearchError;
use serde_json::json;

/// Rendered as `{"error": "message"}` with the matching status code.
#[derive(Debug)]
pub enum ApiError {
    /// 400
    BadRequest(String),
    /// 401
    Unauthorized(String),
    /// 404
    NotFound(String),
    /// 503, e.g. no chunk embeddings loaded
    ServiceUnavailable(String),
    /// 500
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}

impl From<SearchError> for ApiError {
    fn from(e: SearchError) -> Self {
        let msg = e.to_string();
        match e {
            SearchError::InvalidTerm { .. }
            | SearchError::EmptyInput
            | SearchError::DimensionMismatch { .. }
            | SearchError::InvalidEmbedding(_)
            | SearchError::InvalidParameter(_) => ApiError::BadRequest(msg),
            SearchError::UnknownDocument(_) => ApiError::NotFound(msg),
            SearchError::SemanticUnavailable(_) | SearchError::IndexNotFound { .. } => ApiError::ServiceUnavailable(msg),
            _ => {
                tracing::error!(error = %msg, "request failed");
                ApiError::Internal(msg)
            }
        }
    }
}
