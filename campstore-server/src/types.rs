//! Request, response and error types of the HTTP API
//!
//! Every failure leaves the server as an [`ApiError`], which renders as
//!
//! ```json
//! { "error": "duplicate_key", "message": "duplicate email `a@b.co` in collection `applicants`" }
//! ```
//!
//! with one fixed status code per `error` kind.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use campstore::{ErrorKind, Record, StoreError, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

/// Body of a successful submission
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub message: String,
    pub id: String,
    pub record: Record,
}

/// Body of a successful status change
#[derive(Debug, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub success: bool,
    pub message: String,
    pub record: Record,
}

/// `PUT .../{id}/status` request body
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

/// Query string of the list routes
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// `created_at`, `id`, `status` or any record field
    pub sort: Option<String>,
    /// `asc` or `desc`
    pub order: Option<String>,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Everything a handler can fail with
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("too many requests, retry in {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("a valid admin bearer token is required")]
    Unauthorized,

    /// The request could not be read (malformed JSON, bad query string)
    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::Store(error.into())
    }
}

impl ApiError {
    /// Stable machine-readable error identifier
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Store(e) => e.kind().as_str(),
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::Unauthorized => "unauthorized",
            ApiError::BadRequest(_) => ErrorKind::InvalidInput.as_str(),
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Store(e) => match e.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::DuplicateKey => StatusCode::CONFLICT,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::Persistence => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::UnknownCollection => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }

        response
    }
}
