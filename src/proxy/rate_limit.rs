//! Fixed-window per-IP rate limiting

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::ProxyState;
use crate::config::RateLimitConfig;

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    count: u32,
    reset_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Epoch milliseconds at which the client's window resets
    pub reset_at_ms: i64,
}

impl RateLimitDecision {
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert(HEADER_LIMIT, HeaderValue::from(self.limit));
        headers.insert(HEADER_REMAINING, HeaderValue::from(self.remaining));
        headers.insert(HEADER_RESET, HeaderValue::from(self.reset_at_ms));
    }

    /// Reset instant as RFC 3339 with millisecond precision
    pub fn reset_time(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.reset_at_ms)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Request counters keyed by client IP, owned by the server state
#[derive(Debug)]
pub struct RateLimitStore {
    limit: u32,
    window_ms: i64,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimitStore {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            limit: config.limit,
            window_ms: config.window().as_millis() as i64,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, Window>> {
        match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn check(&self, ip: &str) -> RateLimitDecision {
        self.check_at(ip, Utc::now().timestamp_millis())
    }

    /// Count one request from `ip` at `now_ms`.
    pub fn check_at(&self, ip: &str, now_ms: i64) -> RateLimitDecision {
        let fresh = Window {
            count: 0,
            reset_at_ms: now_ms + self.window_ms,
        };
        let mut windows = self.windows();
        let window = windows.entry(ip.to_string()).or_insert(fresh);
        if now_ms > window.reset_at_ms {
            *window = fresh;
        }

        if window.count >= self.limit {
            return RateLimitDecision {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                reset_at_ms: window.reset_at_ms,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - window.count,
            reset_at_ms: window.reset_at_ms,
        }
    }

    /// Drop windows that have already reset; returns how many were removed.
    pub fn purge_expired_at(&self, now_ms: i64) -> usize {
        let mut windows = self.windows();
        let before = windows.len();
        windows.retain(|_, w| now_ms <= w.reset_at_ms);
        before - windows.len()
    }

    pub fn len(&self) -> usize {
        self.windows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Purge expired windows once per window length until `cancel` fires.
    pub fn spawn_purger(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let period = std::time::Duration::from_millis(self.window_ms.max(1) as u64);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.purge_expired_at(Utc::now().timestamp_millis());
                        debug!("rate_limit_purge: removed={} remaining={}", removed, store.len());
                    }
                }
            }
        })
    }
}

/// First `x-forwarded-for` entry, then `x-real-ip`, then loopback.
pub fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    "127.0.0.1".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitedBody {
    success: bool,
    error: &'static str,
    reset_time: String,
}

/// Middleware: reject with 429 over the limit, tag every admitted response.
pub async fn enforce(State(state): State<ProxyState>, request: Request, next: Next) -> Response {
    let ip = client_ip(request.headers());
    let decision = state.limiter.check(&ip);

    if !decision.allowed {
        warn!("rate_limited: ip={} reset_at={}", ip, decision.reset_at_ms);
        let body = RateLimitedBody {
            success: false,
            error: "Rate limit exceeded",
            reset_time: decision.reset_time(),
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        decision.apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}
