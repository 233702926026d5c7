//! API error types with IntoResponse
//!
//! Errors are converted to envelope responses with appropriate status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::envelope::Envelope;
use crate::db::StoreError;
use crate::models::ValidationError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Validation failed (400)
    Validation(ValidationError),

    /// Resource not found (404)
    NotFound { resource: &'static str, id: String },

    /// Store failure (500, logged)
    Store(StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(e) => (StatusCode::BAD_REQUEST, Envelope::failure(e.to_string())),
            Self::NotFound { resource, id } => (
                StatusCode::NOT_FOUND,
                Envelope::failure(format!("{} '{}' not found", resource, id)),
            ),
            Self::Store(e) => {
                // Log the actual error, return generic message
                tracing::error!(operation = e.operation(), "Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Envelope::failure("an internal error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
