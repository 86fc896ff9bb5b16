//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;
use serde::Serialize;
use store::StoreError;
use utoipa::ToSchema;

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: bad JSON, bad query string, bad identifier.
    BadRequest(String),
    /// Missing or unusable credentials.
    Unauthorized(String),
    /// Resource not found.
    NotFound(String),
    /// Client exceeded its request budget.
    RateLimited,
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate limit exceeded".to_string(),
            ),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => internal(&msg),
        };

        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match err {
        DomainError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        DomainError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        DomainError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
        DomainError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        DomainError::Duplicate(msg) => (StatusCode::CONFLICT, msg),
        other => internal(&other),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// JSON body extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejections use the API error body.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Failures while bringing the server up.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bootstrap admin account: {0}")]
    Admin(#[from] DomainError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
