use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppError>;

/// Error kinds exposed on the wire so clients can tell retryable failures
/// (`transient`) apart from everything else.
pub const KIND_VALIDATION: &str = "validation";
pub const KIND_UNAUTHENTICATED: &str = "unauthenticated";
pub const KIND_FORBIDDEN: &str = "forbidden";
pub const KIND_NOT_FOUND: &str = "not_found";
pub const KIND_ILLEGAL_TRANSITION: &str = "illegal_transition";
pub const KIND_TRANSIENT: &str = "transient";
pub const KIND_INTERNAL: &str = "internal";

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl AppError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, KIND_VALIDATION, message)
    }

    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            KIND_UNAUTHENTICATED,
            "authentication required",
        )
    }

    // Deliberately detail-free so the caller learns nothing about why.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, KIND_FORBIDDEN, "permission denied")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, KIND_NOT_FOUND, "resource not found")
    }

    pub fn illegal_transition(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, KIND_ILLEGAL_TRANSITION, message)
    }

    pub fn transient<E: Display>(error: E) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            KIND_TRANSIENT,
            error.to_string(),
        )
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            KIND_INTERNAL,
            error.to_string(),
        )
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            kind: self.kind,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

impl From<crate::lifecycle::LifecycleError> for AppError {
    fn from(value: crate::lifecycle::LifecycleError) -> Self {
        use crate::lifecycle::LifecycleError;
        match value {
            LifecycleError::ApplicationNotFound | LifecycleError::InternshipNotFound => {
                AppError::not_found()
            }
            err @ LifecycleError::IllegalApplicationTransition { .. }
            | err @ LifecycleError::IllegalInternshipTransition { .. } => {
                AppError::illegal_transition(err.to_string())
            }
            LifecycleError::Database(err) => AppError::from(err),
        }
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found(),
            _ => AppError::internal(value),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(value: jsonwebtoken::errors::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
