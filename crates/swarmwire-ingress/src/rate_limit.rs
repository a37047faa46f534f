//! Per-IP sliding-window rate limiting.
//!
//! Two independent limiters are expected to run side by side: a general
//! one guarding `/swarm/message`, and a stricter one guarding
//! `/swarm/join`. Each keeps, per key, a list of recent request
//! timestamps and prunes anything older than the window on each check.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::state::AppState;

pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_secs: u64,
}

pub struct RateLimiter {
    window: Duration,
    limit: u32,
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { window, limit, buckets: Mutex::new(HashMap::new()) }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn per_hour(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }

    /// Record and judge a request from `key` (normally a client IP).
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let timestamps = buckets.entry(key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.limit as usize {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let retry_after = self.window.saturating_sub(now.duration_since(oldest));
            return RateLimitDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                retry_after_secs: retry_after.as_secs().max(1),
            };
        }

        timestamps.push(now);
        RateLimitDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - timestamps.len() as u32,
            retry_after_secs: 0,
        }
    }

    /// Drop buckets with no activity inside the current window, to bound
    /// memory for long-running processes seeing many distinct IPs.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        buckets.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.window);
            !timestamps.is_empty()
        });
    }
}

fn too_many_requests(decision: &RateLimitDecision) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({ "error": { "code": "RATE_LIMITED", "message": "rate limit exceeded" } })),
    )
        .into_response();
    let headers = response.headers_mut();
    headers.insert("Retry-After", HeaderValue::from_str(&decision.retry_after_secs.to_string()).unwrap());
    headers.insert("X-RateLimit-Limit", HeaderValue::from_str(&decision.limit.to_string()).unwrap());
    headers.insert("X-RateLimit-Remaining", HeaderValue::from_str(&decision.remaining.to_string()).unwrap());
    headers.insert(
        "X-RateLimit-Reset",
        HeaderValue::from_str(&decision.retry_after_secs.to_string()).unwrap(),
    );
    response
}

fn client_key(addr: Option<&ConnectInfo<SocketAddr>>) -> String {
    addr.map(|ConnectInfo(addr)| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

async fn enforce(limiter: &Arc<RateLimiter>, key: &str, req: Request, next: Next) -> Response {
    let decision = limiter.check(key);
    if !decision.allowed {
        return too_many_requests(&decision);
    }
    next.run(req).await
}

/// Guards `/swarm/message` at `messages_per_minute`.
pub async fn message_rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(connect_info.as_ref());
    enforce(&state.message_limiter, &key, req, next).await
}

/// Guards `/swarm/join` at `join_requests_per_hour`, additive to the
/// general message limiter.
pub async fn join_rate_limit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    req: Request,
    next: Next,
) -> Response {
    let key = client_key(connect_info.as_ref());
    enforce(&state.join_limiter, &key, req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.check("1.2.3.4").allowed);
        assert!(limiter.check("1.2.3.4").allowed);
        assert!(limiter.check("1.2.3.4").allowed);
        let decision = limiter.check("1.2.3.4");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_secs > 0);
    }

    #[test]
    fn different_keys_have_independent_buckets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
        assert!(!limiter.check("a").allowed);
    }

    #[test]
    fn sweep_drops_empty_buckets() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        limiter.check("a");
        std::thread::sleep(Duration::from_millis(20));
        limiter.sweep();
        assert_eq!(limiter.buckets.lock().unwrap().len(), 0);
    }
}
