//! Request pipeline stages: metrics, rate limiting, response caching, method guard.
//!
//! Each stage is an `axum::middleware::from_fn` function wrapping the next one.
//! The cache write happens here, after the handler has produced its response.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock as _, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter,
};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Prefix of every response-cache key.
pub const CACHE_KEY_PREFIX: &str = "__bd_api__";

/// Largest response body the cache will buffer.
const MAX_CACHED_BODY: usize = 16 * 1024 * 1024;

/// Requests slower than this are logged at warn.
const SLOW_REQUEST: Duration = Duration::from_secs(1);

static X_CACHE: HeaderName = HeaderName::from_static("x-cache");
static X_RESPONSE_TIME: HeaderName = HeaderName::from_static("x-response-time");
static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// A stored 200 response.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    /// Status code
    pub status: StatusCode,
    /// `Content-Type` header, if the handler set one
    pub content_type: Option<HeaderValue>,
    /// Serialized body
    pub body: Bytes,
}

impl CachedResponse {
    fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        if let Some(content_type) = &self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type.clone());
        }
        response
    }
}

/// Cache key for a request URI: prefix, lowercased path without trailing
/// slash, then the query string if any.
pub fn cache_key(uri: &Uri) -> String {
    let path = uri.path().to_lowercase();
    let path = match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };

    match uri.query() {
        Some(query) => format!("{CACHE_KEY_PREFIX}{path}?{query}"),
        None => format!("{CACHE_KEY_PREFIX}{path}"),
    }
}

/// Serves GET requests from the cache and stores fresh 200 responses.
pub async fn response_cache(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.enable_cache || request.method() != Method::GET {
        return next.run(request).await;
    }

    // Nested routers see a stripped path.
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());
    let key = cache_key(&uri);

    if let Some(cached) = state.cache.get(&key) {
        debug!(key = %key, "Cache hit");
        let mut response = cached.to_response();
        response
            .headers_mut()
            .insert(X_CACHE.clone(), HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();
    parts
        .headers
        .insert(X_CACHE.clone(), HeaderValue::from_static("MISS"));

    if parts.status != StatusCode::OK {
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(key = %key, error = %err, "Could not buffer response for caching");
            return ApiError::internal("Failed to read response body").into_response();
        }
    };

    state.cache.set(
        key,
        CachedResponse {
            status: parts.status,
            content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
            body: bytes.clone(),
        },
    );

    Response::from_parts(parts, Body::from(bytes))
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATE LIMITING
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-client GCRA limiter: `max` requests per `window`, bursting up to `max`.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    clock: DefaultClock,
}

impl ClientRateLimiter {
    /// Returns `None` when `max` or `window` is zero (limiting disabled).
    pub fn new(max: u32, window: Duration) -> Option<Self> {
        let burst = NonZeroU32::new(max)?;
        let quota = Quota::with_period(window / max)?.allow_burst(burst);

        Some(Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
        })
    }

    /// Admits one request from `client`, or returns how long it must wait.
    pub fn check(&self, client: &str) -> Result<(), Duration> {
        self.limiter
            .check_key(&client.to_string())
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }

    /// Drops state for clients whose quota has fully replenished.
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }

    /// Number of tracked clients.
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    /// Returns true if no client is tracked.
    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

/// Identifies the client: socket address, then first `X-Forwarded-For` hop.
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    request
        .headers()
        .get(&X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects clients that exhausted their quota with 429.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = &state.limiter else {
        return next.run(request).await;
    };

    let client = client_key(&request);
    match limiter.check(&client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            warn!(client = %client, retry_after_ms = wait.as_millis() as u64, "Rate limit exceeded");
            ApiError::too_many_requests(wait).into_response()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METRICS
// ═══════════════════════════════════════════════════════════════════════════════

/// Request and server-error counters.
#[derive(Debug, Default)]
pub struct RequestMetrics {
    requests: AtomicU64,
    errors: AtomicU64,
}

impl RequestMetrics {
    /// Counts one finished request.
    pub fn record(&self, status: StatusCode) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if status.is_server_error() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Requests seen.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Requests answered with 5xx.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Error percentage rounded to two decimals; 0 before the first request.
    pub fn error_rate(&self) -> f64 {
        let requests = self.requests();
        if requests == 0 {
            return 0.0;
        }
        let percent = self.errors() as f64 / requests as f64 * 100.0;
        (percent * 100.0).round() / 100.0
    }
}

/// Counts requests and sets `X-Response-Time`.
pub async fn track_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let elapsed = started.elapsed();

    state.metrics.record(response.status());
    if let Ok(value) = HeaderValue::from_str(&format!("{}ms", elapsed.as_millis())) {
        response.headers_mut().insert(X_RESPONSE_TIME.clone(), value);
    }

    if elapsed > SLOW_REQUEST {
        warn!(
            method = %method,
            path = %path,
            elapsed_ms = elapsed.as_millis() as u64,
            "Slow request"
        );
    }

    response
}

// ═══════════════════════════════════════════════════════════════════════════════
// METHOD GUARD
// ═══════════════════════════════════════════════════════════════════════════════

/// Lets GET (and HEAD) through, answers everything else with 405.
pub async fn get_only(request: Request, next: Next) -> Response {
    let method = request.method();
    if method == Method::GET || method == Method::HEAD {
        return next.run(request).await;
    }
    ApiError::method_not_allowed(method.as_str()).into_response()
}
