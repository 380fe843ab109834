//! In-process token-bucket rate limiter keyed by client address.
//!
//! Buckets live in process memory: they reset on restart and are not shared
//! between instances.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

use crate::{config::RateLimitConfig, error::ApiError};

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    updated: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            capacity: f64::from(config.burst.max(1)),
            refill_per_sec: f64::from(config.per_minute.max(1)) / 60.0,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Takes one token for `key`; `false` when the bucket is empty.
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.write().await;

        // A bucket idle long enough to refill completely is the same as a
        // missing one, so those are evicted to bound the map.
        let idle = self.full_refill();
        buckets.retain(|_, b| now.saturating_duration_since(b.updated) < idle);

        let bucket = buckets.entry(key.to_string()).or_insert(Bucket {
            tokens: self.capacity,
            updated: now,
        });
        let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.updated = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn full_refill(&self) -> Duration {
        Duration::from_secs_f64(self.capacity / self.refill_per_sec)
    }

    pub async fn tracked_keys(&self) -> usize {
        self.buckets.read().await.len()
    }
}

/// Peer address when known, else the first `x-forwarded-for` entry.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn limit_by_client(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if !limiter.check(&key).await {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return ApiError::TooManyRequests.into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(burst: u32, per_minute: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig { burst, per_minute })
    }

    #[tokio::test]
    async fn test_burst_then_reject() {
        let limiter = limiter(3, 60);
        let now = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at("10.0.0.1", now).await);
        }
        assert!(!limiter.check_at("10.0.0.1", now).await);
        // Other callers have their own bucket.
        assert!(limiter.check_at("10.0.0.2", now).await);
    }

    #[tokio::test]
    async fn test_tokens_refill_over_time() {
        let limiter = limiter(1, 60);
        let now = Instant::now();
        assert!(limiter.check_at("ip", now).await);
        assert!(!limiter.check_at("ip", now + Duration::from_millis(500)).await);
        assert!(limiter.check_at("ip", now + Duration::from_millis(1600)).await);
    }

    #[tokio::test]
    async fn test_idle_buckets_are_evicted() {
        let limiter = limiter(2, 60);
        let now = Instant::now();
        limiter.check_at("a", now).await;
        limiter.check_at("b", now).await;
        assert_eq!(limiter.tracked_keys().await, 2);

        limiter.check_at("c", now + Duration::from_secs(10)).await;
        assert_eq!(limiter.tracked_keys().await, 1);
    }

    #[test]
    fn test_client_key_falls_back_to_forwarded_for() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "203.0.113.9");

        let bare = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
