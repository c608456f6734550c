//! Per-identity sliding-window rate limiter.
//!
//! # Algorithm
//!
//! Every identity owns a chronologically ordered log of the instants at which
//! its requests were admitted. A new request at `now`:
//!
//! 1. drops every logged instant that is `window` old or older,
//! 2. is rejected (and not recorded) if the log still holds `max_requests` entries,
//! 3. otherwise is recorded and admitted.
//!
//! Because the comparison is `count >= max`, no trailing interval of length
//! `window` ever contains more than `max_requests` admissions for one identity.
//!
//! ```text
//!            window
//!     ├──────────────────────┤
//! ──x──x───────x──x───x──────●──▶ time
//!   │  │       └──┴───┴─ counted (3)
//!   └──┴─ expired, pruned   now
//! ```
//!
//! # Concurrency
//!
//! The table is a [`DashMap`], which partitions keys across independently
//! locked shards. The prune/check/append sequence for one identity runs while
//! holding that key's shard write guard, so decisions for a single identity
//! are linearizable while unrelated identities proceed on other shards.
//!
//! # Memory
//!
//! Entries are created lazily and never removed by the admission path.
//! [`SlidingWindowLimiter::evict_idle`] drops identities whose whole log has
//! expired; [`crate::AppState`] runs it periodically.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::trace;

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default admission budget per identity per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 100;

/// Source of the current instant.
///
/// Production code uses [`SystemClock`]; tests substitute a clock they can
/// advance by hand.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Error returned when a limiter configuration cannot be honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LimiterConfigError {
    #[error("rate limit window must be greater than zero")]
    ZeroWindow,

    #[error("max requests per window must be greater than 0; disable rate limiting instead")]
    ZeroMaxRequests,
}

/// Immutable limiter settings, shared read-only by every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    window: Duration,
    max_requests: u32,
}

impl RateLimiterConfig {
    /// Create a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LimiterConfigError`] if either value is zero.
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, LimiterConfigError> {
        if window.is_zero() {
            return Err(LimiterConfigError::ZeroWindow);
        }
        if max_requests == 0 {
            return Err(LimiterConfigError::ZeroMaxRequests);
        }
        Ok(Self {
            window,
            max_requests,
        })
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            max_requests: DEFAULT_MAX_REQUESTS,
        }
    }
}

/// Outcome of one admission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request was recorded; `remaining` more fit in the current window.
    Admitted { remaining: u32 },
    /// The budget is spent; the oldest counted entry expires after `retry_after`.
    Rejected { retry_after: Duration },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

/// Sliding-window admission control keyed by client identity.
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    entries: DashMap<String, VecDeque<Instant>>,
    clock: C,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Create a limiter driven by the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    /// Create a limiter driven by an arbitrary clock.
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Decide whether `identity` may make a request at `now`.
    ///
    /// Admitted requests are recorded; rejected ones are not.
    pub fn try_admit(&self, identity: &str, now: Instant) -> bool {
        self.evaluate(identity, now).is_admitted()
    }

    /// Evaluate `identity` at the limiter clock's current instant.
    pub fn check(&self, identity: &str) -> Decision {
        self.evaluate(identity, self.clock.now())
    }

    /// Evaluate `identity` at `now`, returning budget details for response headers.
    pub fn evaluate(&self, identity: &str, now: Instant) -> Decision {
        // Avoid allocating the key on the hot path when the identity is known.
        match self.entries.get_mut(identity) {
            Some(mut log) => self.admit_into(log.value_mut(), now),
            None => {
                let mut log = self.entries.entry(identity.to_owned()).or_default();
                self.admit_into(log.value_mut(), now)
            }
        }
    }

    /// Prune, check and append. Callers hold the shard guard for `log`.
    fn admit_into(&self, log: &mut VecDeque<Instant>, now: Instant) -> Decision {
        // `now` may be read before the guard is taken, so a racing caller can
        // arrive with an earlier instant. Clamp to keep the log in time order.
        let now = log.back().map_or(now, |newest| now.max(*newest));
        let window = self.config.window;
        while let Some(oldest) = log.front() {
            if now.saturating_duration_since(*oldest) >= window {
                log.pop_front();
            } else {
                break;
            }
        }

        let max = self.config.max_requests as usize;
        if log.len() >= max {
            let retry_after = log
                .front()
                .map(|oldest| window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(window);
            return Decision::Rejected { retry_after };
        }

        log.push_back(now);
        let remaining = max.saturating_sub(log.len());
        Decision::Admitted {
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
        }
    }

    /// Drop identities whose newest admission is at least one window old.
    ///
    /// Such identities no longer influence any decision, so removing them
    /// changes no outcome. Returns the number of identities removed.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let window = self.config.window;
        let before = self.entries.len();
        self.entries.retain(|_, log| {
            log.back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < window)
        });
        let evicted = before.saturating_sub(self.entries.len());
        trace!(evicted, remaining = self.entries.len(), "Idle identity sweep");
        evicted
    }

    /// Evict idle identities as of the limiter clock's current instant.
    pub fn evict_idle_now(&self) -> usize {
        self.evict_idle(self.clock.now())
    }

    /// Number of identities currently holding a log.
    pub fn tracked_identities(&self) -> usize {
        self.entries.len()
    }
}

impl<C: Clock> fmt::Debug for SlidingWindowLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("config", &self.config)
            .field("tracked_identities", &self.entries.len())
            .finish()
    }
}
