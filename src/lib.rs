pub mod api;
pub mod app;
pub mod backend;
pub mod config;
mod middleware;

pub use middleware::builder::RateLimiterBuilder;
pub use middleware::client::{client_identifier, client_input, UNKNOWN_CLIENT};
pub use middleware::RateLimiter;
