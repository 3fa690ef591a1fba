//! Failure to HTTP response mapping.
//!
//! Client-attributable failures (validation, missing credential, provider
//! rejection) become 400 with a `detail` naming the problem. Anything else is
//! an unexpected failure: the response is a bare 500 tagged with
//! [`UnexpectedFailure`], which the error-containment middleware rewrites
//! into the generic body.

use crate::{Failure, ValidationError};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Generic message for 500 responses
pub const INTERNAL_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Handler-level error
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client-attributable failure (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Anything the client could not have caused (500)
    #[error("Internal error: {0}")]
    Unexpected(String),
}

/// Response extension marking a 500 whose body still needs shaping.
/// Carries the detail text, shown only in debug mode.
#[derive(Debug, Clone)]
pub struct UnexpectedFailure(pub String);

#[derive(Serialize)]
struct BadRequestBody {
    error: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct InternalErrorBody {
    error: &'static str,
    message: &'static str,
    detail: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                Json(BadRequestBody {
                    error: "Bad Request",
                    detail,
                }),
            )
                .into_response(),
            ApiError::Unexpected(detail) => {
                let mut response = internal_error(None);
                response.extensions_mut().insert(UnexpectedFailure(detail));
                response
            }
        }
    }
}

/// The generic 500 body. `detail` is only populated in debug mode.
pub fn internal_error(detail: Option<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(InternalErrorBody {
            error: "Internal Server Error",
            message: INTERNAL_ERROR_MESSAGE,
            detail,
        }),
    )
        .into_response()
}

impl From<Failure> for ApiError {
    fn from(failure: Failure) -> Self {
        ApiError::BadRequest(failure.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.0)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
