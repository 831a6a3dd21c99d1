//! Fixed-window rate limiting keyed by client identity.
//!
//! One counter per client per window: the first `limit` requests in a
//! window pass, the rest get 429 with a `Retry-After`. Counters reset when
//! the window elapses; stale entries are pruned lazily when touched and
//! opportunistically when the table grows.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hyper::header::HeaderMap;
use parking_lot::Mutex;

use crate::error::Rejection;

/// Table size above which a check also sweeps expired entries.
const PRUNE_THRESHOLD: usize = 1024;

struct WindowEntry {
    count: u32,
    window_start: Instant,
}

pub struct RateLimiter {
    table: Mutex<HashMap<String, WindowEntry>>,
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiter {
            table: Mutex::new(HashMap::new()),
            limit,
            window,
        }
    }

    /// Count one request against `client`.
    pub fn check(&self, client: &str) -> Result<(), Rejection> {
        self.check_at(client, Instant::now())
    }

    /// Clock-injectable variant; all logic lives here.
    pub fn check_at(&self, client: &str, now: Instant) -> Result<(), Rejection> {
        let mut table = self.table.lock();

        if table.len() > PRUNE_THRESHOLD {
            let window = self.window;
            table.retain(|_, entry| now.duration_since(entry.window_start) < window);
        }

        let entry = table.entry(client.to_string()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        if entry.count >= self.limit {
            return Err(Rejection::RateLimited {
                retry_after_secs: self.window.as_secs(),
            });
        }
        entry.count += 1;
        Ok(())
    }
}

/// Derive the identity a request is rate-limited under: the leftmost
/// `X-Forwarded-For` entry, else `X-Real-IP`, else the remote address,
/// else the literal `"unknown"`.
pub fn client_identity(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    match remote_addr {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}
