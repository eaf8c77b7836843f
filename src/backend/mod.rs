pub mod memory;

pub use memory::{InMemoryBackend, InMemoryBackendBuilder, WindowToken};

use actix_web::rt::time::Instant;
use actix_web::ResponseError;
use std::future::Future;
use std::time::Duration;

/// Admission decision for a single request.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Allowed,
    Denied,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn is_denied(self) -> bool {
        matches!(self, Self::Denied)
    }
}

/// A fixed window rate limit store.
///
/// Every server worker receives its own clone, so state shared between them has to live
/// behind an [Arc](std::sync::Arc).
pub trait Backend: Clone {
    type RollbackToken;
    type Error: ResponseError + 'static;

    /// Decide whether the client named by `input.key` is admitted.
    ///
    /// Returns the decision, the state of the client's window after it, and a token that can
    /// undo an admission.
    fn request(
        &self,
        input: SimpleInput,
    ) -> impl Future<Output = Result<(Decision, SimpleOutput, Self::RollbackToken), Self::Error>>;

    /// Undo the count taken by a previously admitted request, as long as its window is still
    /// the current one.
    ///
    /// The request has already been served at that point, so a failure here can only be
    /// logged.
    fn rollback(&self, token: Self::RollbackToken)
        -> impl Future<Output = Result<(), Self::Error>>;
}

#[derive(Debug, Clone)]
pub struct SimpleInput {
    /// Length of the window.
    pub interval: Duration,
    /// Maximum admitted requests per window.
    pub max_requests: u64,
    /// The client identifier.
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct SimpleOutput {
    pub limit: u64,
    /// Requests still admitted before the window resets.
    pub remaining: u64,
    /// When the current window expires.
    pub reset: Instant,
}

impl SimpleOutput {
    /// Seconds until the window resets, rounded up so that waiting this long is always enough.
    pub fn seconds_until_reset(&self) -> u64 {
        let millis = self
            .reset
            .saturating_duration_since(Instant::now())
            .as_millis() as u64;
        millis.div_ceil(1000)
    }
}
