//! Adaptive request pacing for one provider.
//!
//! Every request waits a random jitter inside the configured window plus the
//! current backoff delay. Rate-limit responses double the backoff; a run of
//! successes shrinks it back toward zero.

use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Backoff tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingConfig {
    /// Lower bound of the per-request jitter.
    pub min_delay: Duration,
    /// Upper bound of the per-request jitter.
    pub max_delay: Duration,
    /// Delay applied on the first rate-limit response.
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub recovery_multiplier: f64,
    /// Consecutive successes before the backoff shrinks.
    pub recovery_threshold: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

#[derive(Debug, Default)]
struct PacingState {
    backoff_ms: u64,
    consecutive_successes: u32,
    rate_limit_hits: u64,
}

/// Per-provider pacer.
#[derive(Debug)]
pub struct Pacer {
    provider: String,
    config: PacingConfig,
    state: Mutex<PacingState>,
}

impl Pacer {
    pub fn new(provider: &str, config: PacingConfig) -> Self {
        Self {
            provider: provider.to_string(),
            config,
            state: Mutex::new(PacingState::default()),
        }
    }

    /// Random pause inside the jitter window. An inverted window collapses to its lower bound.
    fn jitter(&self) -> Duration {
        let min = self.config.min_delay.as_millis() as u64;
        let max = self.config.max_delay.as_millis() as u64;
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Time the next request should wait before being sent.
    pub async fn next_delay(&self) -> Duration {
        let backoff = self.state.lock().await.backoff_ms;
        self.jitter() + Duration::from_millis(backoff)
    }

    /// Sleep until the next request may be sent.
    pub async fn wait(&self) {
        let delay = self.next_delay().await;
        if delay > Duration::ZERO {
            debug!("Pacing {}: waiting {:?}", self.provider, delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Record a successful response.
    pub async fn report_success(&self) {
        let mut state = self.state.lock().await;
        state.consecutive_successes += 1;

        if state.backoff_ms > 0 && state.consecutive_successes >= self.config.recovery_threshold {
            let reduced = (state.backoff_ms as f64 * self.config.recovery_multiplier) as u64;
            if reduced < self.config.initial_backoff.as_millis() as u64 {
                state.backoff_ms = 0;
                info!("{} recovered from rate limit backoff", self.provider);
            } else {
                state.backoff_ms = reduced;
                debug!("{} backoff reduced to {}ms", self.provider, reduced);
            }
            state.consecutive_successes = 0;
        }
    }

    /// Record a rate-limit response (429 or 503).
    pub async fn report_rate_limit(&self, status: u16) {
        let mut state = self.state.lock().await;
        state.rate_limit_hits += 1;
        state.consecutive_successes = 0;

        let grown = if state.backoff_ms == 0 {
            self.config.initial_backoff.as_millis() as u64
        } else {
            (state.backoff_ms as f64 * self.config.backoff_multiplier) as u64
        };
        state.backoff_ms = grown.min(self.config.max_backoff.as_millis() as u64);

        warn!(
            "Rate limited by {} (HTTP {}), backing off to {}ms",
            self.provider, status, state.backoff_ms
        );
    }

    /// Current backoff, excluding jitter.
    pub async fn backoff(&self) -> Duration {
        Duration::from_millis(self.state.lock().await.backoff_ms)
    }

    pub async fn rate_limit_hits(&self) -> u64 {
        self.state.lock().await.rate_limit_hits
    }

    /// Whether a status code is a definite rate limit.
    pub fn is_rate_limit(status: u16) -> bool {
        matches!(status, 429 | 503)
    }
}
