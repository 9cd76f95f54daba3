//! API Middleware (Auth, Rate Limiting, Logging)

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::handlers::AppState;
use super::types::{ApiError, ApiResponse, Meta};
use crate::core::aggregator::TokenService;

/// Routes that skip auth and rate limiting
fn is_exempt(path: &str) -> bool {
    path == "/health" || path == "/api/health"
}

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per window
    pub requests_per_window: u32,
    /// Window duration
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: crate::utils::constants::DEFAULT_RATE_LIMIT_PER_MINUTE,
            window_duration: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn per_minute(requests: u32) -> Self {
        Self {
            requests_per_window: requests,
            ..Self::default()
        }
    }
}

/// Fixed-window in-memory rate limiter keyed by API key or client IP
pub struct RateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    config: RateLimitConfig,
}

/// Outcome of one `check`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            requests: DashMap::new(),
            config,
        }
    }

    /// Count a request against `key`
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let limit = self.config.requests_per_window;

        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        // Reset window if expired
        if now.duration_since(entry.1) >= self.config.window_duration {
            entry.0 = 0;
            entry.1 = now;
        }

        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= limit {
            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_secs,
            };
        }

        entry.0 += 1;
        RateDecision {
            allowed: true,
            limit,
            remaining: limit - entry.0,
            reset_secs,
        }
    }

    /// Drop windows that ended long ago; returns how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests.retain(|_, (_, started)| {
            now.duration_since(*started) < self.config.window_duration * 2
        });
        before.saturating_sub(self.requests.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

/// Periodic cleanup of rate-limit windows and expired lookup caches
pub fn start_cleanup_task(limiter: Arc<RateLimiter>, tokens: Arc<TokenService>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let windows = limiter.cleanup();
            let entries = tokens.cleanup_caches();
            if windows > 0 || entries > 0 {
                info!("🧹 Cleanup: {} rate-limit windows, {} cache entries", windows, entries);
            }
        }
    })
}

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-api-key").and_then(|v| v.to_str().ok())
}

/// Client identity for rate limiting: API key, else first forwarded IP
fn client_key(headers: &HeaderMap) -> String {
    if let Some(key) = api_key(headers) {
        return format!("key:{}", key);
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(|ip| format!("ip:{}", ip.trim()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Inbound API key check, active only when TOKENSCOPE_API_KEY is set
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let expected = match state.config.inbound_api_key.as_deref() {
        Some(key) => key,
        None => return next.run(request).await,
    };
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    match api_key(&headers) {
        Some(key) if key == expected => next.run(request).await,
        provided => {
            let reason = if provided.is_some() { "invalid" } else { "missing" };
            warn!("🔒 Rejected request to {} ({} API key)", request.uri().path(), reason);
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::<()>::error(ApiError::unauthorized(), Meta::empty())),
            )
                .into_response()
        }
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let key = client_key(&headers);
    let decision = state.rate_limiter.check(&key);

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        warn!(key = %key, "Rate limit exceeded");
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::error(
                ApiError::rate_limited(decision.reset_secs),
                Meta::empty(),
            )),
        )
            .into_response();
        response
            .headers_mut()
            .insert("Retry-After", HeaderValue::from(decision.reset_secs));
        response
    };

    // Add rate limit headers
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_secs));
    response
}

/// Request logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    if uri.path().starts_with("/api/stream") || uri.path() == "/api/pump-live" {
        // Streams log when the response head goes out, not when they end
        debug!(method = %method, uri = %uri, status = %status.as_u16(), "Stream opened");
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = %status.as_u16(),
            latency_ms = %latency.as_millis(),
            "Request completed"
        );
    }

    response
}
