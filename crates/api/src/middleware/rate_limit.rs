//! Fixed-window, per-client rate limiting.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::error::ApiError;

const WINDOW_SECS: i64 = 60;

/// Windows are pruned once the table grows past this many clients.
const PRUNE_THRESHOLD: usize = 10_000;

static LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static REMAINING_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RESET_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

/// Outcome of one rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// When the current window closes.
    pub reset_at: DateTime<Utc>,
}

impl RateDecision {
    fn write_headers(&self, headers: &mut HeaderMap) {
        headers.insert(LIMIT_HEADER.clone(), HeaderValue::from(self.limit));
        headers.insert(REMAINING_HEADER.clone(), HeaderValue::from(self.remaining));
        headers.insert(
            RESET_HEADER.clone(),
            HeaderValue::from(self.reset_at.timestamp()),
        );
    }
}

/// Counts requests per client key in one-minute windows.
///
/// Cloning shares the underlying table.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `limit` requests per client per minute.
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Counts one request for `key`.
    pub async fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Utc::now()).await
    }

    async fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateDecision {
        let window_len = Duration::seconds(WINDOW_SECS);
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, w| now - w.started < window_len);
        }

        let window = windows.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now - window.started >= window_len {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let allowed = window.count < self.limit;
        if allowed {
            window.count += 1;
        }
        RateDecision {
            allowed,
            limit: self.limit,
            remaining: self.limit.saturating_sub(window.count),
            reset_at: window.started + window_len,
        }
    }
}

/// Identifies the client: first `X-Forwarded-For` entry, then the peer
/// address, then `"unknown"`.
fn client_key(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_owned();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// Rejects requests over the limit with 429 and stamps the rate limit
/// headers on every response.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    let decision = limiter.check(&key).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        metrics::counter!("rate_limited_requests_total").increment(1);
        tracing::warn!(client = %key, "rate limit exceeded");
        ApiError::RateLimited.into_response()
    };
    decision.write_headers(response.headers_mut());
    response
}
