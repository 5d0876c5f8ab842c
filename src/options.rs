use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff formula used between attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryMode {
    /// Constant delay plus jitter.
    Fixed,
    /// Delay plus jitter plus a factor growing with the attempt number.
    #[default]
    Exponential,
}

/// Configures retry and per-attempt timeout behavior.
///
/// No combination of values is rejected. `max_retries == 0`, a zero `delay`
/// or a zero `max_delay` all mean "never retry".
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay between attempts.
    pub delay: Duration,
    /// Upper bound for any computed delay.
    pub max_delay: Duration,
    /// Timeout applied to each individual attempt.
    pub try_timeout: Duration,
    /// Backoff formula.
    pub mode: RetryMode,
    /// Treat quota/throttling errors like any other transient error instead
    /// of waiting for the server-suggested `Retry-After`.
    pub ignore_throttling: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            try_timeout: Duration::from_secs(60),
            mode: RetryMode::Exponential,
            ignore_throttling: false,
        }
    }
}

impl RetryOptions {
    /// Sets the number of retries after the initial attempt.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the cap applied to every computed delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the timeout of each individual attempt.
    pub fn with_try_timeout(mut self, try_timeout: Duration) -> Self {
        self.try_timeout = try_timeout;
        self
    }

    /// Selects the backoff formula.
    pub fn with_mode(mut self, mode: RetryMode) -> Self {
        self.mode = mode;
        self
    }

    /// Retries quota errors with the mode formula instead of `Retry-After`.
    pub fn with_ignore_throttling(mut self, ignore_throttling: bool) -> Self {
        self.ignore_throttling = ignore_throttling;
        self
    }
}
