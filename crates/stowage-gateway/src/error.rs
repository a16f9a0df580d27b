// SPDX-FileCopyrightText: 2026 Stowage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from [`StowageError`] to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stowage_core::StowageError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

/// Status code for an error.
pub fn status_for(error: &StowageError) -> StatusCode {
    match error {
        StowageError::Validation(_) => StatusCode::BAD_REQUEST,
        StowageError::Auth(_) => StatusCode::UNAUTHORIZED,
        StowageError::NotFound(_) => StatusCode::NOT_FOUND,
        StowageError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Client-facing message. Server-side failures are logged, not echoed.
pub fn public_message(error: &StowageError) -> String {
    match status_for(error) {
        StatusCode::INTERNAL_SERVER_ERROR => "internal server error".to_string(),
        _ => error.to_string(),
    }
}

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub StowageError);

impl From<StowageError> for ApiError {
    fn from(e: StowageError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: public_message(&self.0),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_error_kinds_to_status() {
        let cases = [
            (StowageError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (StowageError::Auth("x".into()), StatusCode::UNAUTHORIZED),
            (StowageError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                StowageError::ProviderUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StowageError::Storage {
                    source: Box::new(std::io::Error::other("disk")),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StowageError::Timeout {
                    duration: std::time::Duration::from_secs(1),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(status_for(&error), status, "{error}");
        }
    }

    #[test]
    fn internal_details_are_hidden() {
        let error = StowageError::Storage {
            source: Box::new(std::io::Error::other("/var/lib/stowage.db locked")),
        };
        assert_eq!(public_message(&error), "internal server error");
        let error = StowageError::Validation("barcode `x` must be 8 to 14 digits".into());
        assert!(public_message(&error).contains("8 to 14 digits"));
    }
}
