use crate::backend::{Backend, Decision, SimpleInput, SimpleOutput};
use actix_web::rt::task::JoinHandle;
use actix_web::rt::time::Instant;
use actix_web::{HttpResponse, ResponseError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_GC_INTERVAL_SECONDS: u64 = 60 * 10;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Rate limit window of {0:?} overflows the clock")]
    IntervalOverflow(Duration),
}

impl ResponseError for Error {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::InternalServerError().finish()
    }
}

/// A fixed window rate limiter [Backend] that keeps one record per client in a
/// [DashMap](dashmap::DashMap).
///
/// Records are never shared across processes and do not survive a restart.
#[derive(Clone)]
pub struct InMemoryBackend {
    map: Arc<DashMap<String, Record>>,
    gc_handle: Option<Arc<GcHandle>>,
}

#[derive(Debug, Clone, Copy)]
struct Record {
    count: u64,
    reset: Instant,
}

/// Identifies the window a request was admitted in, so that undoing it cannot touch a later
/// window of the same client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowToken {
    key: String,
    reset: Instant,
}

// Aborts the collector once the last backend clone is gone.
struct GcHandle(JoinHandle<()>);

impl Drop for GcHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl InMemoryBackend {
    pub fn builder() -> InMemoryBackendBuilder {
        InMemoryBackendBuilder {
            gc_interval: Some(Duration::from_secs(DEFAULT_GC_INTERVAL_SECONDS)),
        }
    }

    /// Decide whether the client named by `input.key` may make another request.
    ///
    /// A missing record, or one whose window ended strictly before now, is replaced by a fresh
    /// window holding this request. Otherwise the request is admitted only while the count is
    /// below the limit, and a rejection leaves the record untouched.
    ///
    /// The whole decision is made while holding the key's shard lock, so concurrent workers
    /// cannot admit more than `max_requests` in one window.
    pub fn check_admission(&self, input: &SimpleInput) -> Result<(Decision, SimpleOutput), Error> {
        let now = Instant::now();
        let fresh = Record {
            count: 1,
            reset: now
                .checked_add(input.interval)
                .ok_or(Error::IntervalOverflow(input.interval))?,
        };
        let (decision, record) = match self.map.entry(input.key.clone()) {
            Entry::Occupied(mut entry) if now <= entry.get().reset => {
                let record = entry.get_mut();
                if record.count >= input.max_requests {
                    (Decision::Denied, *record)
                } else {
                    record.count += 1;
                    (Decision::Allowed, *record)
                }
            }
            Entry::Occupied(mut entry) => {
                entry.insert(fresh);
                (Decision::Allowed, fresh)
            }
            Entry::Vacant(entry) => {
                entry.insert(fresh);
                (Decision::Allowed, fresh)
            }
        };
        let output = SimpleOutput {
            limit: input.max_requests,
            remaining: input.max_requests.saturating_sub(record.count),
            reset: record.reset,
        };
        Ok((decision, output))
    }

    /// Number of records currently held, expired or not.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn garbage_collector(map: Arc<DashMap<String, Record>>, interval: Duration) -> JoinHandle<()> {
        assert!(
            interval.as_secs_f64() > 0f64,
            "GC interval must be non-zero"
        );
        actix_web::rt::spawn(async move {
            loop {
                let now = Instant::now();
                map.retain(|_k, v| v.reset >= now);
                actix_web::rt::time::sleep_until(now + interval).await;
            }
        })
    }
}

impl Backend for InMemoryBackend {
    type RollbackToken = WindowToken;
    type Error = Error;

    async fn request(
        &self,
        input: SimpleInput,
    ) -> Result<(Decision, SimpleOutput, Self::RollbackToken), Self::Error> {
        let (decision, output) = self.check_admission(&input)?;
        let token = WindowToken {
            key: input.key,
            reset: output.reset,
        };
        Ok((decision, output, token))
    }

    async fn rollback(&self, token: Self::RollbackToken) -> Result<(), Self::Error> {
        if let Some(mut record) = self.map.get_mut(&token.key) {
            if record.reset == token.reset {
                record.count = record.count.saturating_sub(1);
            }
        }
        Ok(())
    }
}

pub struct InMemoryBackendBuilder {
    gc_interval: Option<Duration>,
}

impl InMemoryBackendBuilder {
    /// Override the default garbage collector interval.
    ///
    /// Set to None to disable garbage collection, in which case records of clients that never
    /// return stay in memory for the lifetime of the backend.
    ///
    /// The garbage collector periodically removes records whose window has expired.
    pub fn with_gc_interval(mut self, interval: Option<Duration>) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Build the backend. With garbage collection enabled this must be called from within an
    /// actix (tokio) runtime.
    pub fn build(self) -> InMemoryBackend {
        let map = Arc::new(DashMap::<String, Record>::new());
        let gc_handle = self.gc_interval.map(|gc_interval| {
            Arc::new(GcHandle(InMemoryBackend::garbage_collector(
                map.clone(),
                gc_interval,
            )))
        });
        InMemoryBackend { map, gc_handle }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);
    const MILLI: Duration = Duration::from_millis(1);

    fn input(key: &str, max_requests: u64) -> SimpleInput {
        SimpleInput {
            interval: MINUTE,
            max_requests,
            key: key.to_string(),
        }
    }

    #[actix_web::test]
    async fn test_allow_deny() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().build();
        let input = input("1.2.3.4", 10);
        for _ in 0..10 {
            // First 10 should be allowed
            let (decision, _, _) = backend.request(input.clone()).await.unwrap();
            assert!(decision.is_allowed());
        }
        // Eleventh should be denied
        let (decision, _, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_denied());
    }

    #[actix_web::test]
    async fn test_denied_does_not_count() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = input("KEY1", 2);
        let (_, _, token) = backend.request(input.clone()).await.unwrap();
        backend.check_admission(&input).unwrap();
        for _ in 0..5 {
            let (decision, _) = backend.check_admission(&input).unwrap();
            assert!(decision.is_denied());
        }
        assert_eq!(backend.map.get("KEY1").unwrap().count, 2);
        // A single rollback is enough to admit one more, proving the denials were not counted
        backend.rollback(token).await.unwrap();
        let (decision, _) = backend.check_admission(&input).unwrap();
        assert!(decision.is_allowed());
    }

    #[actix_web::test]
    async fn test_reset() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = input("KEY1", 1);
        // Make first request, should be allowed
        let (decision, _, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_allowed());
        // Request again, should be denied
        let (decision, _, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_denied());
        // Exactly at the reset instant the window is still active
        tokio::time::advance(MINUTE).await;
        let (decision, _, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_denied());
        // Once past it, the window starts over
        tokio::time::advance(MILLI).await;
        assert!(backend.map.contains_key("KEY1"));
        let (decision, output, _) = backend.request(input).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(output.remaining, 0);
        assert_eq!(output.reset, Instant::now() + MINUTE);
    }

    #[actix_web::test]
    async fn test_reset_ignores_prior_count() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = input("KEY1", 3);
        for _ in 0..10 {
            backend.check_admission(&input).unwrap();
        }
        tokio::time::advance(MINUTE + MILLI).await;
        for _ in 0..3 {
            let (decision, _) = backend.check_admission(&input).unwrap();
            assert!(decision.is_allowed());
        }
        let (decision, _) = backend.check_admission(&input).unwrap();
        assert!(decision.is_denied());
    }

    #[actix_web::test]
    async fn test_window_boundary_burst() {
        // Fixed windows tolerate up to twice the limit across a boundary; this is expected.
        tokio::time::pause();
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = input("KEY1", 10);
        backend.check_admission(&input).unwrap();
        tokio::time::advance(MINUTE - MILLI).await;
        for _ in 0..9 {
            let (decision, _) = backend.check_admission(&input).unwrap();
            assert!(decision.is_allowed());
        }
        tokio::time::advance(MILLI * 2).await;
        for _ in 0..10 {
            let (decision, _) = backend.check_admission(&input).unwrap();
            assert!(decision.is_allowed());
        }
        let (decision, _) = backend.check_admission(&input).unwrap();
        assert!(decision.is_denied());
    }

    #[actix_web::test]
    async fn test_keys_are_independent() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().build();
        let first = input("1.2.3.4", 2);
        let second = input("5.6.7.8", 2);
        for _ in 0..2 {
            assert!(backend.check_admission(&first).unwrap().0.is_allowed());
        }
        assert!(backend.check_admission(&first).unwrap().0.is_denied());
        let (decision, output) = backend.check_admission(&second).unwrap();
        assert!(decision.is_allowed());
        assert_eq!(output.remaining, 1);
        // Empty and sentinel identifiers are ordinary keys
        assert!(backend.check_admission(&input("", 2)).unwrap().0.is_allowed());
        assert!(backend
            .check_admission(&input("unknown", 2))
            .unwrap()
            .0
            .is_allowed());
        assert_eq!(backend.len(), 4);
    }

    #[actix_web::test]
    async fn test_interval_overflow() {
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = SimpleInput {
            interval: Duration::MAX,
            max_requests: 1,
            key: "KEY1".to_string(),
        };
        assert!(matches!(
            backend.check_admission(&input),
            Err(Error::IntervalOverflow(_))
        ));
        assert!(backend.is_empty());
    }

    #[actix_web::test]
    async fn test_garbage_collection() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder()
            .with_gc_interval(Some(MINUTE))
            .build();
        backend.request(input("KEY1", 1)).await.unwrap();
        backend
            .request(SimpleInput {
                interval: MINUTE * 2,
                max_requests: 1,
                key: "KEY2".to_string(),
            })
            .await
            .unwrap();
        assert!(backend.map.contains_key("KEY1"));
        assert!(backend.map.contains_key("KEY2"));
        // Advance past KEY1's window so the collector removes it, but not KEY2
        tokio::time::advance(MINUTE + MILLI).await;
        assert!(!backend.map.contains_key("KEY1"));
        assert!(backend.map.contains_key("KEY2"));
    }

    #[actix_web::test]
    async fn test_gc_survives_dropped_clone() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder()
            .with_gc_interval(Some(MINUTE))
            .build();
        drop(backend.clone());
        backend.request(input("KEY1", 1)).await.unwrap();
        tokio::time::advance(MINUTE + MILLI).await;
        assert!(!backend.map.contains_key("KEY1"));
    }

    #[actix_web::test]
    async fn test_output() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().build();
        let input = input("KEY1", 2);
        // First of 2 should be allowed.
        let (decision, output, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(output.remaining, 1);
        assert_eq!(output.limit, 2);
        assert_eq!(output.reset, Instant::now() + MINUTE);
        // Second of 2 should be allowed.
        let (decision, output, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_allowed());
        assert_eq!(output.remaining, 0);
        assert_eq!(output.reset, Instant::now() + MINUTE);
        // Should be denied, and the window is unchanged
        let (decision, output, _) = backend.request(input).await.unwrap();
        assert!(decision.is_denied());
        assert_eq!(output.remaining, 0);
        assert_eq!(output.limit, 2);
        assert_eq!(output.reset, Instant::now() + MINUTE);
    }

    #[actix_web::test]
    async fn test_rollback() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().build();
        let input = input("KEY1", 5);
        let (_, output, rollback) = backend.request(input.clone()).await.unwrap();
        assert_eq!(output.remaining, 4);
        backend.rollback(rollback).await.unwrap();
        // Remaining requests should still be the same, since the previous call was excluded
        let (_, output, _) = backend.request(input).await.unwrap();
        assert_eq!(output.remaining, 4);
    }

    #[actix_web::test]
    async fn test_rollback_after_window_expired() {
        tokio::time::pause();
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = SimpleInput {
            interval: Duration::from_secs(1),
            max_requests: 1,
            key: "KEY1".to_string(),
        };
        let (decision, _, stale) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_allowed());
        tokio::time::advance(Duration::from_millis(1001)).await;
        let (decision, _, _) = backend.request(input.clone()).await.unwrap();
        assert!(decision.is_allowed());
        // Undoing a request from the previous window must not free a slot in this one
        backend.rollback(stale).await.unwrap();
        let (decision, output, _) = backend.request(input).await.unwrap();
        assert!(decision.is_denied());
        assert_eq!(output.remaining, 0);
    }

    #[test]
    fn test_concurrent_admission() {
        let backend = InMemoryBackend::builder().with_gc_interval(None).build();
        let input = &input("KEY1", 10);
        let shared = &backend;
        let admitted: usize = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(move || {
                        (0..1000)
                            .filter(|_| shared.check_admission(input).unwrap().0.is_allowed())
                            .count()
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).sum()
        });
        assert_eq!(admitted, 10);
        assert_eq!(backend.map.get("KEY1").unwrap().count, 10);
    }
}
