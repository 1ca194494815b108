//! Bounded exponential backoff shared by the request executor and the
//! event subscriber's reconnect loop.

use std::time::Duration;

use rand::Rng;

/// Retry schedule: `initial * multiplier^attempt`, capped at `max_delay`,
/// spread by a random jitter of up to `jitter` in either direction.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry. Default: 1s.
    pub initial_delay: Duration,
    /// Growth factor per attempt. Default: 2.0.
    pub multiplier: f64,
    /// Upper bound on any single delay. Default: 30s.
    pub max_delay: Duration,
    /// Total attempts including the first one. Default: 4.
    pub max_attempts: u32,
    /// Ceiling on time spent retrying one call. Default: 60s.
    pub max_elapsed: Duration,
    /// Jitter fraction in `[0, 1)`. Default: 0.25.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            max_attempts: 4,
            max_elapsed: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * multiplier^attempt, max) * (1 + u)`, with `u`
/// drawn uniformly from `[-jitter, jitter]` and the result capped at `max`.
///
/// Each call draws afresh, so clients that fail together spread out on
/// retry. A zero `jitter` yields the exact exponential schedule.
pub fn calculate_backoff(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = policy.initial_delay.as_secs_f64() * policy.multiplier.powi(exponent);
    let max = policy.max_delay.as_secs_f64();
    let capped = base.min(max);

    let spread = policy.jitter.clamp(0.0, 1.0);
    let jitter_factor = if spread > 0.0 {
        1.0 + rand::rng().random_range(-spread..=spread)
    } else {
        1.0
    };
    let with_jitter = (capped * jitter_factor).clamp(0.0, max);

    Duration::try_from_secs_f64(with_jitter).unwrap_or(policy.max_delay)
}
