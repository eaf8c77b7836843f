use crate::backend::{Backend, SimpleInput, SimpleOutput};
use crate::middleware::{DeniedResponse, RateLimiter};
use actix_web::dev::ServiceRequest;
use actix_web::http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use std::rc::Rc;

pub static X_RATELIMIT_LIMIT: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-limit"));

pub static X_RATELIMIT_REMAINING: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-remaining"));

pub static X_RATELIMIT_RESET: Lazy<HeaderName> =
    Lazy::new(|| HeaderName::from_static("x-ratelimit-reset"));

pub struct RateLimiterBuilder<B, F> {
    backend: B,
    input_fn: F,
    headers: bool,
    denied_response: Rc<DeniedResponse>,
    rollback_server_errors: bool,
}

impl<B, F> RateLimiterBuilder<B, F>
where
    B: Backend + 'static,
    F: Fn(&ServiceRequest) -> Result<SimpleInput, actix_web::Error> + 'static,
{
    pub(super) fn new(backend: B, input_fn: F) -> Self {
        Self {
            backend,
            input_fn,
            headers: false,
            denied_response: Rc::new(|output: &SimpleOutput| {
                HttpResponse::TooManyRequests()
                    .insert_header((RETRY_AFTER, output.seconds_until_reset()))
                    .finish()
            }),
            rollback_server_errors: false,
        }
    }

    /// Set `x-ratelimit-limit`, `x-ratelimit-remaining` and `x-ratelimit-reset` (seconds until
    /// the window resets) on both admitted and denied responses.
    pub fn add_headers(mut self) -> Self {
        self.headers = true;
        self
    }

    /// Configure the [HttpResponse] returned to a denied client.
    ///
    /// Defaults to an empty 429 with `retry-after` set to the seconds until the window resets.
    pub fn request_denied_response<R>(mut self, denied_response: R) -> Self
    where
        R: Fn(&SimpleOutput) -> HttpResponse + 'static,
    {
        self.denied_response = Rc::new(denied_response);
        self
    }

    /// Give back the count taken by a request whose response is a server error (5xx), so that
    /// failures of the service itself are not charged to the client.
    pub fn rollback_server_errors(mut self) -> Self {
        self.rollback_server_errors = true;
        self
    }

    pub fn build(self) -> RateLimiter<B, F> {
        RateLimiter {
            backend: self.backend,
            input_fn: Rc::new(self.input_fn),
            headers: self.headers,
            denied_response: self.denied_response,
            rollback_server_errors: self.rollback_server_errors,
        }
    }
}

/// Write the `x-ratelimit-*` headers for `output` into `map`, replacing any existing values.
pub fn insert_rate_limit_headers(map: &mut HeaderMap, output: &SimpleOutput) {
    map.insert(X_RATELIMIT_LIMIT.clone(), HeaderValue::from(output.limit));
    map.insert(
        X_RATELIMIT_REMAINING.clone(),
        HeaderValue::from(output.remaining),
    );
    map.insert(
        X_RATELIMIT_RESET.clone(),
        HeaderValue::from(output.seconds_until_reset()),
    );
}
