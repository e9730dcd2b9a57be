//! Error type for webhook handlers.
//!
//! Domain failures never reach this type: they are folded into the session
//! state and returned with a 200. Only transport-level problems (bad request,
//! unknown session, store failures) become error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roombook_runtime::StoreError;
use serde::Serialize;
use std::fmt;

/// Handler error rendered as `{code, message}` JSON
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: &'static str,
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create an error
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: &'static str) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach the underlying error (logged, never sent to the client)
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// 400
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message.into(), "BAD_REQUEST")
    }

    /// 404
    #[must_use]
    pub fn not_found(resource: impl fmt::Display, id: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{resource} with id {id} not found"),
            "NOT_FOUND",
        )
    }

    /// 500
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message.into(), "INTERNAL_SERVER_ERROR")
    }

    /// 503
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message.into(), "SERVICE_UNAVAILABLE")
    }

    /// HTTP status
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = self.code,
                    message = %self.message,
                    error = %source,
                    "Request failed"
                ),
                None => tracing::error!(status = %self.status, code = self.code, message = %self.message, "Request failed"),
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ShutdownInProgress => Self::unavailable("server is shutting down"),
            other => Self::internal("session storage failed").with_source(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roombook_runtime::RepositoryError;

    #[test]
    fn display_includes_code() {
        let err = AppError::bad_request("session_key is required");
        assert_eq!(err.to_string(), "[BAD_REQUEST] session_key is required");
    }

    #[test]
    fn store_errors_map_to_server_statuses() {
        assert_eq!(
            AppError::from(StoreError::ShutdownInProgress).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let save = StoreError::Save {
            key: "U1".to_string(),
            source: RepositoryError::Unavailable("disk full".to_string()),
        };
        assert_eq!(AppError::from(save).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
