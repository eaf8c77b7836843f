pub mod builder;
pub mod client;

use crate::backend::{Backend, SimpleInput, SimpleOutput};
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{HttpResponse, ResponseError};
use builder::{insert_rate_limit_headers, RateLimiterBuilder};
use futures::future::{ok, LocalBoxFuture, Ready};
use std::rc::Rc;

type DeniedResponse = dyn Fn(&SimpleOutput) -> HttpResponse;

/// Rate limit middleware.
///
/// Consults a [Backend] before every request; denied requests never reach the wrapped service.
pub struct RateLimiter<B, F> {
    backend: B,
    input_fn: Rc<F>,
    headers: bool,
    denied_response: Rc<DeniedResponse>,
    rollback_server_errors: bool,
}

impl<B: Clone, F> Clone for RateLimiter<B, F> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            input_fn: Rc::clone(&self.input_fn),
            headers: self.headers,
            denied_response: Rc::clone(&self.denied_response),
            rollback_server_errors: self.rollback_server_errors,
        }
    }
}

impl<B, F> RateLimiter<B, F>
where
    B: Backend + 'static,
    F: Fn(&ServiceRequest) -> Result<SimpleInput, actix_web::Error> + 'static,
{
    /// # Arguments
    ///
    /// * `backend`: The store deciding admission.
    /// * `input_fn`: Derives the backend input (the client key and its limit) from a request.
    pub fn builder(backend: B, input_fn: F) -> RateLimiterBuilder<B, F> {
        RateLimiterBuilder::new(backend, input_fn)
    }
}

impl<S, Body, B, F> Transform<S, ServiceRequest> for RateLimiter<B, F>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Body>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    Body: 'static,
    B: Backend + 'static,
    F: Fn(&ServiceRequest) -> Result<SimpleInput, actix_web::Error> + 'static,
{
    type Response = ServiceResponse<EitherBody<Body>>;
    type Error = actix_web::Error;
    type Transform = RateLimiterMiddleware<S, B, F>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimiterMiddleware {
            service: Rc::new(service),
            limiter: self.clone(),
        })
    }
}

pub struct RateLimiterMiddleware<S, B, F> {
    service: Rc<S>,
    limiter: RateLimiter<B, F>,
}

impl<S, Body, B, F> Service<ServiceRequest> for RateLimiterMiddleware<S, B, F>
where
    S: Service<ServiceRequest, Response = ServiceResponse<Body>, Error = actix_web::Error> + 'static,
    S::Future: 'static,
    Body: 'static,
    B: Backend + 'static,
    F: Fn(&ServiceRequest) -> Result<SimpleInput, actix_web::Error> + 'static,
{
    type Response = ServiceResponse<EitherBody<Body>>;
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let input = match (limiter.input_fn)(&req) {
                Ok(input) => input,
                Err(e) => {
                    log::error!("Unable to derive rate limit key: {e}");
                    return Ok(req.error_response(e).map_into_right_body());
                }
            };

            let (decision, output, token) = match limiter.backend.request(input).await {
                Ok(admission) => admission,
                Err(e) => {
                    log::error!("Rate limit backend failed: {e}");
                    return Ok(req.into_response(e.error_response()).map_into_right_body());
                }
            };

            if decision.is_denied() {
                log::debug!("Rate limit exceeded: {} {}", req.method(), req.path());
                let mut response = (limiter.denied_response)(&output);
                if limiter.headers {
                    insert_rate_limit_headers(response.headers_mut(), &output);
                }
                return Ok(req.into_response(response).map_into_right_body());
            }

            let mut response = service.call(req).await?;

            let status = response.status();
            if limiter.rollback_server_errors && status.is_server_error() {
                if let Err(e) = limiter.backend.rollback(token).await {
                    log::error!("Unable to roll back rate limit count after {status}: {e}");
                }
            }

            if limiter.headers {
                insert_rate_limit_headers(response.headers_mut(), &output);
            }

            Ok(response.map_into_left_body())
        })
    }
}
