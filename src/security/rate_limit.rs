//! Per-client rate limiting over two sliding windows.
//!
//! Every client gets a minute window and an hour window of request
//! timestamps. A request is admitted only while both windows are below their
//! limits; rejected attempts are not recorded. Reset hints are aligned to
//! wall-clock minute/hour boundaries rather than to the client's oldest
//! request.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use crate::clock::{self, Clock};
use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// Length of the short (burst) window.
pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);

/// Length of the long (sustained) window.
pub const HOUR_WINDOW: Duration = Duration::from_secs(3600);

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the tighter of the two windows.
    pub remaining: u32,
    /// Seconds until the relevant window boundary.
    pub reset_in: u64,
}

/// Limiter occupancy for the admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub minute_clients: usize,
    pub hour_clients: usize,
    pub per_minute: u32,
    pub per_hour: u32,
}

type Stamps = VecDeque<Duration>;

#[derive(Debug)]
struct Windows<K> {
    minute: HashMap<K, Stamps>,
    hour: HashMap<K, Stamps>,
}

/// Drop timestamps that have aged out of `window`. Stamps are appended in
/// time order, so expired ones are always at the front.
fn prune(stamps: &mut Stamps, now: Duration, window: Duration) {
    while let Some(&oldest) = stamps.front() {
        if now.saturating_sub(oldest) >= window {
            stamps.pop_front();
        } else {
            break;
        }
    }
}

fn reset_in(now: Duration, window: Duration) -> u64 {
    let window = window.as_secs();
    window - now.as_secs() % window
}

/// Dual-window limiter shared by all request handlers.
///
/// One lock guards both windows; each call takes it once.
#[derive(Debug)]
pub struct SlidingWindowLimiter<K = String> {
    windows: Mutex<Windows<K>>,
    per_minute: u32,
    per_hour: u32,
    clock: Arc<dyn Clock>,
}

impl<K> SlidingWindowLimiter<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new(per_minute: u32, per_hour: u32) -> Self {
        Self::with_clock(per_minute, per_hour, clock::system())
    }

    pub fn with_clock(per_minute: u32, per_hour: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(Windows {
                minute: HashMap::new(),
                hour: HashMap::new(),
            }),
            per_minute,
            per_hour,
            clock,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.per_minute, config.per_hour)
    }

    /// The per-minute limit, advertised to clients in `X-RateLimit-Limit`.
    pub fn per_minute(&self) -> u32 {
        self.per_minute
    }

    /// Check whether `client` may make another request and, if so, record it.
    pub fn check_and_record(&self, client: &K) -> RateLimitDecision {
        let now = self.clock.now();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let Windows { minute, hour } = &mut *windows;

        let minute_stamps = minute.entry(client.clone()).or_default();
        prune(minute_stamps, now, MINUTE_WINDOW);
        let hour_stamps = hour.entry(client.clone()).or_default();
        prune(hour_stamps, now, HOUR_WINDOW);

        let minute_count = minute_stamps.len() as u32;
        let hour_count = hour_stamps.len() as u32;

        if minute_count >= self.per_minute {
            metrics::record_rate_limited("minute");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in: reset_in(now, MINUTE_WINDOW),
            };
        }

        if hour_count >= self.per_hour {
            metrics::record_rate_limited("hour");
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_in: reset_in(now, HOUR_WINDOW),
            };
        }

        minute_stamps.push_back(now);
        hour_stamps.push_back(now);

        RateLimitDecision {
            allowed: true,
            remaining: (self.per_minute - (minute_count + 1))
                .min(self.per_hour - (hour_count + 1)),
            reset_in: reset_in(now, MINUTE_WINDOW),
        }
    }

    /// Prune both windows for every client and forget clients that have gone
    /// quiet. Returns the number of clients whose minute window emptied.
    ///
    /// Hour history is kept until the hour window itself empties, so a client
    /// idle for a minute still carries its hourly usage.
    pub fn cleanup_idle_clients(&self) -> usize {
        let now = self.clock.now();
        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");

        let mut cleaned = 0;
        windows.minute.retain(|_, stamps| {
            prune(stamps, now, MINUTE_WINDOW);
            if stamps.is_empty() {
                cleaned += 1;
                false
            } else {
                true
            }
        });
        windows.hour.retain(|_, stamps| {
            prune(stamps, now, HOUR_WINDOW);
            !stamps.is_empty()
        });

        cleaned
    }

    pub fn stats(&self) -> LimiterStats {
        let windows = self.windows.lock().expect("rate limiter mutex poisoned");
        LimiterStats {
            minute_clients: windows.minute.len(),
            hour_clients: windows.hour.len(),
            per_minute: self.per_minute,
            per_hour: self.per_hour,
        }
    }
}
