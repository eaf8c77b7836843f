mod error;
pub mod payload;
pub mod validation;

pub use error::{internal_error, rate_limited, ApiError};

use crate::api::payload::{Greeting, Health, Submission};
use crate::api::validation::HelloInput;
use actix_web::http::header::CACHE_CONTROL;
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, HttpResponse};

/// Headers added to every response that does not already set them.
pub const SECURITY_HEADERS: [(&str, &str); 4] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Referrer-Policy", "strict-origin-when-cross-origin"),
];

pub fn security_headers() -> DefaultHeaders {
    SECURITY_HEADERS
        .into_iter()
        .fold(DefaultHeaders::new(), |headers, header| headers.add(header))
}

/// `GET /api/route?name=..`
///
/// Only the first `name` parameter is considered.
pub async fn greet(query: web::Query<Vec<(String, String)>>) -> Result<HttpResponse, ApiError> {
    let name = query
        .into_inner()
        .into_iter()
        .find_map(|(key, value)| (key == "name").then_some(value));
    let input = HelloInput::from_query(name)?;
    Ok(HttpResponse::Ok()
        .insert_header((CACHE_CONTROL, "public, max-age=300"))
        .json(Greeting::new(&input)))
}

/// `POST /api/route` with a JSON object body.
///
/// A body that cannot be read, including one over the payload size limit, is an internal
/// failure like a body that is not JSON.
pub async fn submit(
    body: Result<web::Bytes, actix_web::Error>,
) -> Result<HttpResponse, ApiError> {
    let body = body.map_err(ApiError::Payload)?;
    let value: serde_json::Value = serde_json::from_slice(&body)?;
    let input = HelloInput::from_json(&value)?;
    Ok(HttpResponse::Ok().json(Submission::new(input)))
}

/// `GET /health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(Health {
        status: "healthy",
        timestamp: payload::timestamp(),
    })
}
