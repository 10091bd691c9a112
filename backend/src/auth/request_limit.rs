//! Per-IP request limiting for the API
//!
//! A fixed window per client address. Unlike the login lockout this counts
//! every request, successful or not, and only throttles: nothing escalates.

use crate::auth::ClientInfo;
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::warn;

/// Expired windows are dropped once this many addresses are tracked
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client IP
#[derive(Debug)]
pub struct RequestLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RequestLimiter {
    /// `max_requests` of 0 disables limiting
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Count a request; `Err` carries the time until the window resets
    pub fn check(&self, ip: &str) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: &str, now: Instant) -> Result<(), Duration> {
        if self.max_requests == 0 {
            return Ok(());
        }

        let window = self.window;
        let mut windows = self.windows.lock();
        if windows.len() >= SWEEP_THRESHOLD && !windows.contains_key(ip) {
            windows.retain(|_, w| now.saturating_duration_since(w.started) < window);
        }

        let entry = windows.entry(ip.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            return Err(window.saturating_sub(now.saturating_duration_since(entry.started)));
        }
        entry.count += 1;
        Ok(())
    }

    /// Number of tracked addresses
    pub fn tracked(&self) -> usize {
        self.windows.lock().len()
    }
}

/// Axum middleware rejecting requests over the per-IP budget with 429
pub async fn limit_requests(
    State(state): State<AppState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(retry_after) = state.request_limiter().check(&client.ip) {
        warn!(client_ip = %client.ip, "Request limit exceeded");
        metrics::counter!("http_requests_limited_total").increment(1);
        return Err(ApiError::TooManyRequests { retry_after });
    }
    Ok(next.run(request).await)
}
