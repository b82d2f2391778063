use atrium_core::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            CoreError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            CoreError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            CoreError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            CoreError::Backpressure(m) => (StatusCode::TOO_MANY_REQUESTS, m.clone()),
            CoreError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m.clone()),
            CoreError::Transient(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            CoreError::Permanent(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            CoreError::AlreadyResolved(m) => (StatusCode::CONFLICT, m.clone()),
            CoreError::MaxRetriesExceeded(m) => (StatusCode::TOO_MANY_REQUESTS, m.clone()),
            CoreError::WorkerSpaceCleanup(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            CoreError::Cancelled(m) => (StatusCode::CONFLICT, m.clone()),
        };
        tracing::warn!(status = %status, error = %self.0, "request failed");
        (status, Json(json!({ "error": message }))).into_response()
    }
}
