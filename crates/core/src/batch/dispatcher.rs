//! Batch dispatcher with bounded concurrency and rate-limit backoff.
//!
//! Runs an ordered list of independent [`CallDescriptor`]s and returns their
//! [`CallResult`]s in the same order, regardless of completion order. One
//! descriptor's failure never cancels the others.
//!
//! Two defenses against the provider's per-second rate limit:
//! - reactive: a 429 response is retried with `Retry-After`-honoring or
//!   exponential backoff, up to a small fixed budget, without holding an
//!   in-flight slot while sleeping;
//! - adaptive: every response's rate-limit headers feed a shared
//!   [`RateLimitState`]; when the per-second budget is nearly spent, new
//!   launches are delayed until the window rolls over.

use std::sync::Arc;
use std::time::Duration;

use centralkit_domain::{CallDescriptor, CallResult};
use futures::future::join_all;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::ApiExecutor;

/// Tuning knobs for one dispatcher.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum concurrently in-flight calls. Central's gateway allows 7
    /// calls per second; 6 leaves headroom for a retry inside the window.
    pub max_in_flight: usize,
    /// Rate-limit retries per descriptor (attempts = retries + 1).
    pub max_retries: usize,
    /// First backoff delay when the provider sends no `Retry-After`.
    pub base_backoff: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_in_flight: 6, max_retries: 3, base_backoff: Duration::from_secs(1) }
    }
}

/// Shared view of the provider's remaining rate-limit budget.
///
/// Updated from every response; consulted before every launch.
#[derive(Default)]
pub struct RateLimitState {
    hold_until: Mutex<Option<Instant>>,
}

impl RateLimitState {
    /// Record a response's rate-limit signals.
    pub async fn observe(&self, result: &CallResult) {
        let penalty = if result.is_rate_limited() {
            // Window already blown; anything launched now would 429 too.
            Some(result.retry_after.unwrap_or(Duration::from_secs(1)))
        } else if result.rate_limit.is_some_and(|rl| rl.near_limit()) {
            // Per-second budget nearly spent: wait out the current window.
            Some(Duration::from_secs(1))
        } else {
            None
        };

        if let Some(penalty) = penalty {
            let mut guard = self.hold_until.lock().await;
            let candidate = Instant::now() + penalty;
            if guard.map_or(true, |held| candidate > held) {
                *guard = Some(candidate);
            }
        }
    }

    /// Wait until the provider's window permits another launch.
    pub async fn wait_for_slot(&self) {
        let held = *self.hold_until.lock().await;
        if let Some(until) = held {
            let now = Instant::now();
            if until > now {
                debug!(delay_ms = (until - now).as_millis() as u64, "throttling launch");
                tokio::time::sleep_until(until).await;
            }
        }
    }
}

/// Order-preserving concurrent executor for independent calls.
pub struct BatchDispatcher {
    executor: Arc<dyn ApiExecutor>,
    config: BatchConfig,
    rate_limit: Arc<RateLimitState>,
    semaphore: Arc<Semaphore>,
}

impl BatchDispatcher {
    #[must_use]
    pub fn new(executor: Arc<dyn ApiExecutor>) -> Self {
        Self::with_config(executor, BatchConfig::default())
    }

    #[must_use]
    pub fn with_config(executor: Arc<dyn ApiExecutor>, config: BatchConfig) -> Self {
        let permits = config.max_in_flight.max(1);
        Self {
            executor,
            config,
            rate_limit: Arc::new(RateLimitState::default()),
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Execute every descriptor and return results in input order.
    ///
    /// Infallible: failures are `ok == false` entries in the output, and the
    /// output always has the same length as the input.
    pub async fn execute_many(&self, descriptors: &[CallDescriptor]) -> Vec<CallResult> {
        let futures = descriptors.iter().map(|descriptor| self.run_one(descriptor));
        // join_all preserves input order regardless of completion order.
        join_all(futures).await
    }

    /// Execute a single descriptor with the dispatcher's retry and
    /// throttling policy. Exposed for callers that interleave single calls
    /// with batches and want the same rate-limit behavior.
    pub async fn run_one(&self, descriptor: &CallDescriptor) -> CallResult {
        let mut attempt = 0usize;
        loop {
            let result = {
                // Semaphore is never closed, so acquire cannot fail.
                let _permit = self.semaphore.acquire().await;
                // Checked under the permit: a hold set while we queued must
                // still delay this launch.
                self.rate_limit.wait_for_slot().await;
                self.executor.execute(descriptor).await
            };

            self.rate_limit.observe(&result).await;

            // Only rate-limit rejections are retried here. Transport
            // failures and other HTTP errors were already given their one
            // chance by the engine's own policy.
            if result.is_rate_limited() && attempt < self.config.max_retries {
                let delay = result
                    .retry_after
                    .unwrap_or_else(|| self.backoff_delay(attempt));
                attempt += 1;
                warn!(
                    path = %descriptor.path,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            if result.is_rate_limited() {
                warn!(path = %descriptor.path, "rate-limit retries exhausted");
            }

            return result;
        }
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.min(8) as u32;
        self.config.base_backoff.saturating_mul(1u32 << shift)
    }
}
