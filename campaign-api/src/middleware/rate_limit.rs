/// Per-client rate limiting
///
/// Each client IP gets its own token bucket (GCRA via `governor`) with a
/// quota of `RATE_LIMIT_PER_MINUTE` requests per minute and an equal burst.
/// Buckets live in a `DashMap` and are pruned by a background task once a
/// client has been idle long enough for its bucket to be full again.
///
/// The client key is the peer address from `ConnectInfo`, falling back to the
/// first `X-Forwarded-For` entry when the server runs without connect info.
///
/// Rejected requests get `429 Too Many Requests` with a `Retry-After` header.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use crate::error::ApiError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct ClientBucket {
    limiter: DirectLimiter,
    /// Seconds since the state was created
    last_seen: AtomicU64,
}

/// Rate limiter state shared across requests
pub struct RateLimiterState {
    buckets: DashMap<String, ClientBucket>,
    quota: Quota,
    clock: DefaultClock,
    started: Instant,
}

impl RateLimiterState {
    /// `requests_per_minute` of zero is treated as one
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            buckets: DashMap::new(),
            quota: Quota::per_minute(requests),
            clock: DefaultClock::default(),
            started: Instant::now(),
        }
    }

    fn now_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Takes one token for `key`; on rejection returns the wait until the next token
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        let now = self.now_secs();
        let bucket = self.buckets.entry(key.to_string()).or_insert_with(|| ClientBucket {
            limiter: RateLimiter::direct(self.quota),
            last_seen: AtomicU64::new(now),
        });

        bucket.last_seen.store(now, Ordering::Relaxed);

        bucket
            .limiter
            .check()
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drops buckets of clients not seen for `max_idle`
    pub fn retain_recent(&self, max_idle: Duration) {
        let cutoff = self.now_secs().saturating_sub(max_idle.as_secs());
        self.buckets.retain(|_, bucket| bucket.last_seen.load(Ordering::Relaxed) >= cutoff);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Identifies the caller for rate limiting purposes
fn client_key(request: &Request) -> String {
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

/// Rate limiting middleware; `/health` is exempt
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let key = client_key(&request);

    if let Err(wait) = limiter.check(&key) {
        tracing::warn!(client = %key, path = %request.uri().path(), "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: wait.as_secs().max(1),
        });
    }

    Ok(next.run(request).await)
}
