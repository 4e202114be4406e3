//! Retry policy for rate-limited classifier calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound honored for a server-supplied retry hint.
const MAX_RETRY_HINT: Duration = Duration::from_secs(60);

/// How rate-limited attempts are retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 means 4 attempts total).
    pub max_retries: u32,
    /// Delay for the first retry; doubled for every further attempt.
    pub base_delay: Duration,
    /// Cap for the computed exponential delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retrying after failed attempt number `attempt` (0-based).
    ///
    /// A server hint wins when present; otherwise `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        match server_hint {
            Some(hint) => hint.min(MAX_RETRY_HINT),
            None => backoff_delay(attempt, self.base_delay, self.max_backoff),
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, never above `cap`.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(cap).min(cap)
}

/// Parse a `Retry-After` header value given in whole seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(header_value: Option<&str>) -> Option<Duration> {
    header_value?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Parse a protobuf-style duration string such as `"17s"` or `"0.5s"`.
pub fn parse_duration_secs(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().strip_suffix('s')?.parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Per-request retry bookkeeping. Never shared between requests.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempts: u32,
    /// Total time spent waiting between attempts.
    pub backoff_elapsed: Duration,
    /// Description of the most recent failure.
    pub last_error: Option<String>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, error: impl ToString) {
        self.last_error = Some(error.to_string());
    }

    pub fn record_wait(&mut self, wait: Duration) {
        self.backoff_elapsed += wait;
    }
}
