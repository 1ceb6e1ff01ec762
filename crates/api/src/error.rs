//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AccessError, DomainError, OrderError};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
            OrderError::InvalidReference { .. }
            | OrderError::InvalidState(_)
            | OrderError::DuplicateService { .. }
            | OrderError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OrderError::Conflict { .. }
            | OrderError::AlreadyExists { .. }
            | OrderError::InUse { .. } => StatusCode::CONFLICT,
        },
        DomainError::Access(AccessError::Unauthenticated) => StatusCode::UNAUTHORIZED,
        DomainError::Access(AccessError::Forbidden { .. }) => StatusCode::FORBIDDEN,
        DomainError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        ApiError::Domain(err.into())
    }
}
