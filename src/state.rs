//! Shared application state for Axum handlers and middleware.
//!
//! Holds the configuration, the shared sliding-window limiter and the trusted
//! proxy set. Everything is behind `Arc`, so cloning per request is cheap.
//!
//! # Structured Concurrency
//!
//! The idle-identity sweep runs as a background task managed with
//! `tokio_util::task::TaskTracker` and `CancellationToken`. Call `shutdown()`
//! to stop it before application exit.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AppResult;
use crate::limiter::SlidingWindowLimiter;
use crate::metrics;
use crate::middleware::TrustedProxies;

/// Shared application state.
///
/// # Lifecycle
///
/// ```rust,ignore
/// let state = AppState::new(config)?;
/// // ... serve requests ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Admission limiter, `None` when rate limiting is disabled
    pub limiter: Option<Arc<SlidingWindowLimiter>>,
    /// Networks whose forwarding headers identify the client
    pub trusted_proxies: Arc<TrustedProxies>,
    /// Timestamp when the application started
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Create application state and start the idle-identity sweep if enabled.
    ///
    /// Must be called within a Tokio runtime when the sweep is enabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::LimiterConfig` if the limiter settings are invalid.
    pub fn new(config: Config) -> AppResult<Self> {
        let limiter = config
            .limiter_config()?
            .map(|limiter_config| Arc::new(SlidingWindowLimiter::new(limiter_config)));
        let trusted_proxies = Arc::new(TrustedProxies::new(&config.trusted_proxies));

        let state = Self {
            config: Arc::new(config),
            limiter,
            trusted_proxies,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        state.spawn_idle_sweep_task();

        Ok(state)
    }

    /// Number of client identities currently tracked by the limiter.
    pub fn tracked_identities(&self) -> usize {
        self.limiter
            .as_ref()
            .map_or(0, |limiter| limiter.tracked_identities())
    }

    /// Seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Spawn the periodic eviction of identities whose window has fully expired.
    fn spawn_idle_sweep_task(&self) {
        let Some(limiter) = self.limiter.clone() else {
            return;
        };
        if !self.config.sweep_enabled() {
            info!("Idle client sweep disabled");
            return;
        }

        let period = self.config.rate_limit_sweep_interval;
        let token = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Idle client sweep stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = limiter.evict_idle_now();
                        let tracked = limiter.tracked_identities();
                        metrics::set_tracked_identities(tracked);
                        if evicted > 0 {
                            debug!(evicted, tracked, "Evicted idle clients");
                        }
                    }
                }
            }
        });

        info!(period_secs = period.as_secs(), "Idle client sweep started");
    }

    /// Stop background tasks and wait for them to finish.
    pub async fn shutdown(&self) {
        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        info!("Background tasks stopped");
    }
}
