use std::time::Duration;

use rand::Rng;

use crate::{HubError, RetryMode, RetryOptions};

/// Fraction of the base delay used as the upper bound of the jitter.
pub const JITTER_FACTOR: f64 = 0.08;

/// Wait applied to quota/throttling errors that carry no `Retry-After`.
pub const DEFAULT_QUOTA_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Computes the delay before the next attempt.
///
/// Built once from [`RetryOptions`] and never mutated afterwards, so one
/// instance can be shared by every request of a client.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    options: RetryOptions,
    base_jitter: Duration,
    retry_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryOptions::default())
    }
}

impl RetryPolicy {
    /// Snapshots `options` and precomputes the jitter bound and growth factor.
    pub fn new(options: RetryOptions) -> Self {
        let base_jitter = options.delay.mul_f64(JITTER_FACTOR);
        let retry_factor = match options.mode {
            RetryMode::Fixed => 0.0,
            RetryMode::Exponential => exponential_factor(&options),
        };
        Self {
            options,
            base_jitter,
            retry_factor,
        }
    }

    /// Options this policy was built from.
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    /// Upper bound of the random addition to each delay.
    pub fn base_jitter(&self) -> Duration {
        self.base_jitter
    }

    /// Growth factor of the exponential formula (0 in fixed mode).
    pub fn retry_factor(&self) -> f64 {
        self.retry_factor
    }

    /// Returns the wait before retrying after `error`, or `None` to stop.
    ///
    /// `attempt` is 1-based: pass `1` when deciding on the first retry.
    pub fn calculate_retry_delay(&self, error: &HubError, attempt: u32) -> Option<Duration> {
        let jitter = rand::thread_rng().gen::<f64>();
        self.delay_with_jitter(error, attempt, jitter)
    }

    fn delay_with_jitter(&self, error: &HubError, attempt: u32, jitter: f64) -> Option<Duration> {
        let opts = &self.options;
        if opts.max_retries == 0
            || opts.delay.is_zero()
            || opts.max_delay.is_zero()
            || attempt > opts.max_retries
        {
            return None;
        }

        let jitter_secs = jitter * self.base_jitter.as_secs_f64();

        let secs = match error {
            HubError::QuotaExceeded { retry_after, .. } if !opts.ignore_throttling => {
                retry_after.as_secs_f64() + jitter_secs
            }
            _ => match opts.mode {
                RetryMode::Fixed => opts.delay.as_secs_f64() + jitter_secs,
                RetryMode::Exponential => {
                    opts.delay.as_secs_f64()
                        + jitter_secs
                        + self.retry_factor.powf(f64::from(attempt))
                }
            },
        };

        let delay = Duration::try_from_secs_f64(secs).unwrap_or(opts.max_delay);
        Some(delay.min(opts.max_delay))
    }
}

// ln(max_delay - delay) / ln(max_retries), so the last retry lands near
// max_delay. Zero when either logarithm is non-positive.
fn exponential_factor(opts: &RetryOptions) -> f64 {
    let span = opts.max_delay.as_secs_f64() - opts.delay.as_secs_f64();
    if span <= 0.0 || opts.max_retries == 0 {
        return 0.0;
    }
    let numerator = span.ln();
    let denominator = f64::from(opts.max_retries).ln();
    if numerator <= 0.0 || denominator <= 0.0 || !numerator.is_finite() {
        return 0.0;
    }
    numerator / denominator
}
