use crate::api;
use crate::backend::{InMemoryBackend, SimpleInput, SimpleOutput};
use crate::config::RateLimitConfig;
use crate::{client_input, RateLimiter};
use actix_web::dev::ServiceRequest;
use actix_web::web;

/// Build the limiter guarding `/api`, keyed by client identifier alone.
///
/// Rejected clients receive a JSON 429 with a fixed `Retry-After`; both allowed and rejected
/// responses carry the `x-ratelimit-*` headers.
pub fn rate_limiter(
    backend: InMemoryBackend,
    config: &RateLimitConfig,
) -> RateLimiter<
    InMemoryBackend,
    impl Fn(&ServiceRequest) -> Result<SimpleInput, actix_web::Error> + 'static,
> {
    let retry_after = config.retry_after;
    let builder = RateLimiter::builder(backend, client_input(config.window, config.limit))
        .add_headers()
        .request_denied_response(move |_output: &SimpleOutput| api::rate_limited(retry_after));
    if config.rollback_server_errors {
        builder.rollback_server_errors().build()
    } else {
        builder.build()
    }
}

/// Register the application routes. `backend` holds the rate limit records and is shared by
/// every worker the closure is invoked for.
pub fn configure(
    backend: InMemoryBackend,
    config: RateLimitConfig,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| {
        cfg.route("/health", web::get().to(api::health)).service(
            web::scope("/api").wrap(rate_limiter(backend, &config)).service(
                web::resource("/route")
                    .route(web::get().to(api::greet))
                    .route(web::post().to(api::submit)),
            ),
        );
    }
}
