//! Error-to-response mapping for the HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use banyan_core::Error;

/// Wrapper giving `banyan_core::Error` an HTTP shape.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) | Error::FileNotFound(_) | Error::NoteNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::OrdinalConflict { .. } => StatusCode::CONFLICT,
            Error::Integrity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Replication(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(
                subsystem = "api",
                error = %self.0,
                "Request failed with internal error"
            );
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Result alias for handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
