use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use scrapegate_core::error::{AppError, ErrorKind};

use crate::dto::ErrorResponse;

pub const INVALID_MACHINE: &str = "Invalid machine number (71-110).";
pub const AUTHENTICATION_FAILED: &str = "Authentication failed";
pub const PERFORMANCE_FAILED: &str = "Failed to scrape data";
pub const JOBS_FAILED: &str = "Failed to scrape job data";

/// An [`AppError`] plus the opaque message its endpoint answers with when
/// the failure is not the caller's fault.
///
/// The body never carries the underlying error text; that goes to the log.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub failure_message: &'static str,
}

impl ApiError {
    pub fn performance(error: AppError) -> Self {
        Self {
            error,
            failure_message: PERFORMANCE_FAILED,
        }
    }

    pub fn jobs(error: AppError) -> Self {
        Self {
            error,
            failure_message: JOBS_FAILED,
        }
    }

    /// Status code and body text for this error.
    pub fn status_and_message(&self) -> (StatusCode, &'static str) {
        match self.error.kind() {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, INVALID_MACHINE),
            ErrorKind::Authentication => (StatusCode::UNAUTHORIZED, AUTHENTICATION_FAILED),
            ErrorKind::Timeout
            | ErrorKind::Extraction
            | ErrorKind::Upstream
            | ErrorKind::Internal => (StatusCode::INTERNAL_SERVER_ERROR, self.failure_message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self.error, kind = ?self.error.kind(), "{message}");
        } else {
            tracing::warn!(error = %self.error, "{message}");
        }

        let body = ErrorResponse {
            error: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
