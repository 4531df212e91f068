//! Per-client token-bucket rate limiting

use axum::{
    body::Body,
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, sync::Arc, time::Duration, time::Instant};
use tokio::sync::RwLock;

use super::client_ip;
use crate::error::ApiError;

/// Paths the gateway or the orchestrator's health checks call; never throttled.
const EXEMPT_PATHS: &[&str] = &["/health", "/api/payments/webhook"];

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_update: Instant::now(),
        }
    }

    fn try_consume(&mut self, tokens_per_second: f64, max_tokens: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * tokens_per_second).min(max_tokens);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Rate limiter state
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    tokens_per_second: f64,
    max_tokens: f64,
}

impl RateLimiter {
    /// `requests_per_second` sustained, with bursts of twice that.
    pub fn new(requests_per_second: u32) -> Self {
        let rps = requests_per_second.max(1) as f64;
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            tokens_per_second: rps,
            max_tokens: rps * 2.0,
        }
    }

    /// Check if a request is allowed
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.max_tokens));

        bucket.try_consume(self.tokens_per_second, self.max_tokens)
    }

    /// Drop buckets idle for longer than `max_age`; returns how many went.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < max_age);
        before - buckets.len()
    }

    /// Run [`cleanup`](Self::cleanup) every `every` in the background.
    pub fn spawn_cleanup(&self, every: Duration, max_age: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let removed = limiter.cleanup(max_age).await;
                if removed > 0 {
                    tracing::debug!(removed, "Dropped idle rate-limit buckets");
                }
            }
        })
    }
}

/// Create rate limiting middleware layer
pub fn rate_limit_layer(
    rate_limiter: RateLimiter,
) -> impl Fn(
    Request<Body>,
    Next,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone
       + Send {
    move |request: Request<Body>, next: Next| {
        let rate_limiter = rate_limiter.clone();
        Box::pin(async move {
            if EXEMPT_PATHS.contains(&request.uri().path()) {
                return next.run(request).await;
            }

            let client_key = client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string());

            if !rate_limiter.check(&client_key).await {
                tracing::warn!(client = %client_key, "Rate limit exceeded");
                let mut response = ApiError::TooManyRequests.into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
                return response;
            }

            next.run(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_burst_is_twice_the_rate() {
        let limiter = RateLimiter::new(5);

        for _ in 0..10 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
        // other clients are unaffected
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_cleanup_drops_idle_buckets() {
        let limiter = RateLimiter::new(2);
        limiter.check("10.0.0.1").await;
        limiter.check("10.0.0.2").await;

        assert_eq!(limiter.cleanup(Duration::from_secs(60)).await, 0);
        assert_eq!(limiter.cleanup(Duration::ZERO).await, 2);
    }
}
