/// Rate limiting for the public form endpoints
///
/// Contact, newsletter and password-reset requests can be sent without a
/// session, so they are limited per client IP with a token bucket kept in
/// process memory.
///
/// # Algorithm
///
/// - Each client starts with a full bucket of `forms_per_minute` tokens
/// - Tokens refill at a constant rate of `forms_per_minute / 60` per second
/// - Each request consumes 1 token
/// - A request that finds the bucket empty gets 429 with `Retry-After`
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: whole tokens left after this request
/// - `Retry-After`: seconds to wait (429 responses only)
///
/// The client key is the socket peer address, or the first
/// `X-Forwarded-For` entry when the server sits behind a proxy.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Buckets idle for longer than this are dropped on the next sweep
const IDLE_EVICTION: Duration = Duration::from_secs(600);

/// Token bucket for one client
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed_secs = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until one token is available
    fn seconds_until_available(&self, rate: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil().max(1.0) as u64
        }
    }
}

/// Result of one admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed { remaining: u32 },
    Limited { retry_after: u64 },
}

/// Per-client token buckets shared by all requests
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_rate: f64,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    /// Allows `per_minute` requests per client per minute (at least one)
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = per_minute.max(1);
        Self {
            capacity,
            refill_rate: capacity as f64 / 60.0,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.capacity
    }

    pub async fn check(&self, client: &str) -> Admission {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: &str, now: Instant) -> Admission {
        let mut buckets = self.buckets.lock().await;
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < IDLE_EVICTION);

        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.refill(self.refill_rate, self.capacity, now);

        if bucket.try_consume() {
            Admission::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            Admission::Limited {
                retry_after: bucket.seconds_until_available(self.refill_rate),
            }
        }
    }
}

/// Identifies the caller for rate limiting
fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: bucket empty for this client
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_key(request.headers(), peer);
    let limiter = &state.form_limiter;

    match limiter.check(&client).await {
        Admission::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("X-RateLimit-Limit", HeaderValue::from(limiter.limit()));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
            Ok(response)
        }
        Admission::Limited { retry_after } => {
            tracing::warn!(client = %client, path = %request.uri().path(), "Rate limit exceeded");
            Err(ApiError::RateLimitExceeded {
                retry_after,
                message: format!(
                    "Too many requests. Limit: {} per minute. Try again in {} seconds.",
                    limiter.limit(),
                    retry_after
                ),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_allows_capacity_then_limits() {
        let limiter = RateLimiter::per_minute(3);
        let now = Instant::now();

        assert_eq!(limiter.check_at("1.2.3.4", now).await, Admission::Allowed { remaining: 2 });
        assert_eq!(limiter.check_at("1.2.3.4", now).await, Admission::Allowed { remaining: 1 });
        assert_eq!(limiter.check_at("1.2.3.4", now).await, Admission::Allowed { remaining: 0 });
        assert_eq!(limiter.check_at("1.2.3.4", now).await, Admission::Limited { retry_after: 20 });

        // Other clients have their own bucket
        assert!(matches!(limiter.check_at("5.6.7.8", now).await, Admission::Allowed { .. }));
    }

    #[tokio::test]
    async fn test_bucket_refills_over_time() {
        let limiter = RateLimiter::per_minute(60);
        let start = Instant::now();
        for _ in 0..60 {
            assert!(matches!(limiter.check_at("ip", start).await, Admission::Allowed { .. }));
        }
        assert!(matches!(limiter.check_at("ip", start).await, Admission::Limited { .. }));

        let later = start + Duration::from_secs(2);
        assert!(matches!(limiter.check_at("ip", later).await, Admission::Allowed { .. }));
    }

    #[test]
    fn test_zero_limit_still_admits_one() {
        assert_eq!(RateLimiter::per_minute(0).limit(), 1);
    }

    #[test]
    fn test_client_key_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.1:5000".parse().unwrap();
        assert_eq!(client_key(&headers, Some(peer)), "10.0.0.1");

        headers.insert("X-Forwarded-For", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.9");
        assert_eq!(client_key(&HeaderMap::new(), None), "unknown");
    }
}
