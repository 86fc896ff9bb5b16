//! Router-wide middleware.

pub mod http_metrics;
pub mod rate_limit;

pub use http_metrics::track_http;
pub use rate_limit::{RateLimiter, rate_limit};
