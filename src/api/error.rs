use crate::api::validation::{ValidationErrors, ValidationIssue};
use actix_web::http::header::RETRY_AFTER;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub const RATE_LIMITED_MESSAGE: &str = "Too many requests. Please try again later.";
pub const INVALID_INPUT_MESSAGE: &str = "Invalid input";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
pub const INTERNAL_ERROR_DETAIL: &str = "Something went wrong. Please try again later.";

/// Failures of the `/api/route` handlers.
///
/// Only validation failures are described to the client; everything else is logged and
/// reported as a generic 500.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("Unable to parse request body: {0}")]
    MalformedBody(#[from] serde_json::Error),
    #[error("Unable to read request body: {0}")]
    Payload(actix_web::Error),
}

#[derive(Debug, Serialize)]
struct InvalidInputBody<'a> {
    error: &'static str,
    details: &'a [ValidationIssue],
}

#[derive(Debug, Serialize)]
struct InternalErrorBody {
    error: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct RateLimitedBody {
    error: &'static str,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::MalformedBody(_) | ApiError::Payload(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Validation(errors) => HttpResponse::BadRequest().json(InvalidInputBody {
                error: INVALID_INPUT_MESSAGE,
                details: &errors.0,
            }),
            ApiError::MalformedBody(_) | ApiError::Payload(_) => {
                log::error!("API error: {self}");
                internal_error()
            }
        }
    }
}

/// The generic 500 response; never carries details of the cause.
pub fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(InternalErrorBody {
        error: INTERNAL_ERROR_MESSAGE,
        message: INTERNAL_ERROR_DETAIL,
    })
}

/// The 429 response for a rejected client.
pub fn rate_limited(retry_after: Duration) -> HttpResponse {
    HttpResponse::TooManyRequests()
        .insert_header((RETRY_AFTER, retry_after.as_secs()))
        .json(RateLimitedBody {
            error: RATE_LIMITED_MESSAGE,
        })
}
