use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{warn, Instrument};
use uuid::Uuid;

/// Fixed-window per-key request limiter.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_window: u64,
    window: Duration,
    entries: DashMap<String, (u64, Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_window: u64, window: Duration) -> Self {
        Self {
            requests_per_window,
            window,
            entries: DashMap::new(),
        }
    }

    pub fn check_rate_limit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut entry = self.entries.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.window {
            *entry = (1, now);
            return true;
        }
        if entry.0 >= self.requests_per_window {
            return false;
        }
        entry.0 += 1;
        true
    }

    /// Drops windows that have already closed.
    pub fn prune(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, start)| now.duration_since(*start) < self.window);
    }
}

pub async fn rate_limiter_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    if let Some(ip) = ip {
        if !limiter.check_rate_limit(&ip) {
            warn!(action = "rate_limited", ip = %ip);
            return Err(StatusCode::TOO_MANY_REQUESTS);
        }
    }
    Ok(next.run(request).await)
}

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    req.extensions_mut().insert(request_id.clone());
    let span = tracing::info_span!("request", request_id = %request_id, method = %req.method(), uri = %req.uri());
    next.run(req).instrument(span).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_blocks_after_quota() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.1"));
        assert!(!limiter.check_rate_limit("10.0.0.1"));
        assert!(limiter.check_rate_limit("10.0.0.2"));
    }

    #[test]
    fn limiter_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(0));
        assert!(limiter.check_rate_limit("ip"));
        assert!(limiter.check_rate_limit("ip"));
    }

    #[test]
    fn prune_removes_closed_windows() {
        let limiter = RateLimiter::new(1, Duration::from_millis(0));
        limiter.check_rate_limit("ip");
        limiter.prune();
        assert!(limiter.entries.is_empty());
    }
}
