use clap::Parser;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_RATE_LIMIT: u64 = 10;
pub const DEFAULT_RATE_WINDOW_MS: u64 = 60 * 1000;
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Rate limit must allow at least one request per window")]
    ZeroRateLimit,
    #[error("Rate limit window must be non-zero")]
    ZeroRateWindow,
}

/// Command line and environment configuration for the server.
#[derive(Parser, Debug, Clone)]
#[command(name = "scaffold-api")]
#[command(about = "Rate limited greeting API for the Next-Gen Web Scaffold")]
pub struct Config {
    /// Address to bind the server to
    #[arg(long, env = "SCAFFOLD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the server to
    #[arg(short, long, env = "SCAFFOLD_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Number of server workers, 0 uses one per CPU
    #[arg(long, env = "SCAFFOLD_WORKERS", default_value_t = 0)]
    pub workers: usize,

    /// Maximum admitted requests per client per window
    #[arg(long, env = "SCAFFOLD_RATE_LIMIT", default_value_t = DEFAULT_RATE_LIMIT)]
    pub rate_limit: u64,

    /// Rate limit window in milliseconds
    #[arg(long, env = "SCAFFOLD_RATE_WINDOW_MS", default_value_t = DEFAULT_RATE_WINDOW_MS)]
    pub rate_window_ms: u64,

    /// Value of the Retry-After header on rejected requests, in seconds
    #[arg(long, env = "SCAFFOLD_RETRY_AFTER_SECS", default_value_t = DEFAULT_RETRY_AFTER_SECS)]
    pub retry_after_secs: u64,

    /// How often expired rate limit records are evicted, 0 disables eviction
    #[arg(long, env = "SCAFFOLD_GC_INTERVAL_SECS", default_value_t = 600)]
    pub gc_interval_secs: u64,

    /// Do not count requests that end in a server error against the client
    #[arg(long, env = "SCAFFOLD_ROLLBACK_SERVER_ERRORS")]
    pub rollback_server_errors: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rate_limit().validate()
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            limit: self.rate_limit,
            window: Duration::from_millis(self.rate_window_ms),
            retry_after: Duration::from_secs(self.retry_after_secs),
            rollback_server_errors: self.rollback_server_errors,
        }
    }

    pub fn gc_interval(&self) -> Option<Duration> {
        match self.gc_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

/// Policy applied to `/api` requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum admitted requests per window.
    pub limit: u64,
    /// Window length, starting at the first request of each window.
    pub window: Duration,
    /// Advertised in the `Retry-After` header of rejected requests.
    pub retry_after: Duration,
    pub rollback_server_errors: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RATE_LIMIT,
            window: Duration::from_millis(DEFAULT_RATE_WINDOW_MS),
            retry_after: Duration::from_secs(DEFAULT_RETRY_AFTER_SECS),
            rollback_server_errors: false,
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::ZeroRateLimit);
        }
        if self.window.is_zero() {
            return Err(ConfigError::ZeroRateWindow);
        }
        Ok(())
    }
}
