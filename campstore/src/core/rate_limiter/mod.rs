//! Sliding-window rate limiter
//!
//! This module provides [`SlidingWindowLimiter`], which admits at most
//! `limit` requests per client key within any trailing `window`.
//!
//! # Algorithm
//!
//! Each key owns a FIFO of the instants at which it was admitted. On every
//! check:
//!
//! 1. Instants that are a full window old or older are evicted
//! 2. If `limit` instants remain, the request is denied and nothing is recorded
//! 3. Otherwise the current instant is recorded and the request is allowed
//!
//! A window therefore never holds more than `limit` entries, and its
//! instants stay sorted even when callers race and arrive out of order.
//!
//! # Concurrency
//!
//! Decisions take a shared lock on the key map plus the key's own mutex, so
//! checks for different keys run in parallel while checks for the same key
//! are serialized. Windows that have emptied out are dropped by a periodic
//! sweep that briefly takes the map exclusively.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;


// Configuration constants
const DEFAULT_LIMIT: usize = 10;
const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_CAPACITY: usize = 1000;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Maximum number of requests per window
    pub limit: usize,
    /// Requests still available in the current window after this one
    pub remaining: usize,
    /// Time until the next request will be admitted (zero if allowed)
    pub retry_after: Duration,
}

/// Per-key sliding-window admission gate
///
/// # Example
///
/// ```
/// use campstore::SlidingWindowLimiter;
/// use std::time::{Duration, Instant};
///
/// let limiter = SlidingWindowLimiter::new(5, Duration::from_secs(60));
/// let now = Instant::now();
///
/// for _ in 0..5 {
///     assert!(limiter.check_at("203.0.113.7", now).allowed);
/// }
/// assert!(!limiter.check_at("203.0.113.7", now).allowed);
///
/// // A minute later the window has slid past the earlier requests
/// let later = now + Duration::from_secs(61);
/// assert!(limiter.check_at("203.0.113.7", later).allowed);
/// ```
pub struct SlidingWindowLimiter {
    limit: usize,
    window: Duration,
    cleanup_interval: Duration,
    windows: RwLock<HashMap<String, Mutex<VecDeque<Instant>>>>,
    next_cleanup: Mutex<Instant>,
}

/// Builder for configuring a SlidingWindowLimiter
///
/// # Example
///
/// ```
/// use campstore::SlidingWindowLimiter;
/// use std::time::Duration;
///
/// let limiter = SlidingWindowLimiter::builder()
///     .limit(3)
///     .window(Duration::from_secs(10))
///     .cleanup_interval(Duration::from_secs(120))
///     .capacity(10_000)
///     .build();
/// assert_eq!(limiter.limit(), 3);
/// ```
pub struct SlidingWindowLimiterBuilder {
    limit: usize,
    window: Duration,
    capacity: usize,
    cleanup_interval: Duration,
}

impl SlidingWindowLimiter {
    /// Create a limiter admitting `limit` requests per `window` for each key
    pub fn new(limit: usize, window: Duration) -> Self {
        Self::builder().limit(limit).window(window).build()
    }

    pub fn builder() -> SlidingWindowLimiterBuilder {
        SlidingWindowLimiterBuilder {
            limit: DEFAULT_LIMIT,
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            capacity: DEFAULT_CAPACITY,
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or deny a request for `key` at the current instant
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).allowed
    }

    /// Like [`allow`](Self::allow), with the full decision
    pub fn check(&self, key: &str) -> RateLimitResult {
        self.check_at(key, Instant::now())
    }

    /// Admit or deny a request for `key` at instant `now`
    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
        self.maybe_cleanup(now);

        {
            let windows = self.windows.read();
            if let Some(window) = windows.get(key) {
                return self.decide(&mut window.lock(), now);
            }
        }

        let mut windows = self.windows.write();
        let window = windows.entry(key.to_string()).or_default();
        self.decide(window.get_mut(), now)
    }

    /// Number of keys currently tracked
    pub fn active_keys(&self) -> usize {
        self.windows.read().len()
    }

    /// Drop every window that holds no request newer than `now - window`
    ///
    /// Returns the number of keys removed.
    pub fn purge(&self, now: Instant) -> usize {
        let mut windows = self.windows.write();
        let before = windows.len();
        windows.retain(|_, window| {
            let window = window.get_mut();
            self.evict(window, now);
            !window.is_empty()
        });
        before - windows.len()
    }

    fn maybe_cleanup(&self, now: Instant) {
        {
            let mut next_cleanup = self.next_cleanup.lock();
            if now < *next_cleanup {
                return;
            }
            *next_cleanup = now + self.cleanup_interval;
        }

        let removed = self.purge(now);
        if removed > 0 {
            tracing::debug!(removed, "dropped idle rate limit windows");
        }
    }

    fn evict(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = window.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    fn decide(&self, window: &mut VecDeque<Instant>, now: Instant) -> RateLimitResult {
        self.evict(window, now);

        if window.len() >= self.limit {
            let retry_after = window
                .front()
                .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return RateLimitResult {
                allowed: false,
                limit: self.limit,
                remaining: 0,
                retry_after,
            };
        }

        // Instants read before the lock was taken may arrive out of order
        let position = window.partition_point(|&t| t <= now);
        window.insert(position, now);
        RateLimitResult {
            allowed: true,
            limit: self.limit,
            remaining: self.limit - window.len(),
            retry_after: Duration::ZERO,
        }
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl SlidingWindowLimiterBuilder {
    /// Maximum requests admitted per key within one window
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Length of the trailing window
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Expected number of distinct keys
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// How often idle windows are swept
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn build(self) -> SlidingWindowLimiter {
        SlidingWindowLimiter {
            limit: self.limit,
            window: self.window,
            cleanup_interval: self.cleanup_interval,
            windows: RwLock::new(HashMap::with_capacity(self.capacity)),
            next_cleanup: Mutex::new(Instant::now() + self.cleanup_interval),
        }
    }
}
