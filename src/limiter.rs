//! Per-client sliding-window rate limiter
//!
//! Each identity owns a queue of admission timestamps. A check prunes entries
//! that have aged out of the trailing window, then admits and records `now`
//! only if fewer than `limit` remain. Pruning happens lazily during checks.
//!
//! The prune-check-append sequence for one identity runs under that
//! identity's map entry lock, so two concurrent requests from the same client
//! cannot both take the last slot. Identities in different shards never
//! contend.

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of requests per window
pub const DEFAULT_LIMIT: usize = 60;

/// Default trailing window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct SlidingWindowLimiter {
    windows: Arc<DashMap<String, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT, DEFAULT_WINDOW)
    }
}

impl SlidingWindowLimiter {
    /// * `limit`  - requests admitted per window
    /// * `window` - length of the trailing window
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            window,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit a request from `identity` at the current instant
    pub fn admit(&self, identity: &str) -> bool {
        self.admit_at(identity, Instant::now())
    }

    /// Admit a request from `identity` at `now`.
    ///
    /// Rejections are not recorded, so a client hammering a full window does
    /// not extend its own lockout.
    pub fn admit_at(&self, identity: &str, now: Instant) -> bool {
        let mut timestamps = match self.windows.get_mut(identity) {
            Some(entry) => entry,
            None => self.windows.entry(identity.to_owned()).or_default(),
        };

        prune(&mut timestamps, now, self.window);
        if timestamps.len() >= self.limit {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    /// Requests currently counted against `identity`, as of the last check
    pub fn in_window(&self, identity: &str) -> usize {
        self.windows.get(identity).map_or(0, |w| w.len())
    }

    /// Number of identities being tracked
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }

    /// Drop identities with nothing left in their window at `now`.
    ///
    /// Returns how many were removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, timestamps| {
            prune(timestamps, now, self.window);
            !timestamps.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }
}

/// Remove timestamps at least `window` older than `now`
fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&oldest) = timestamps.front() {
        if now.saturating_duration_since(oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
