//! Retry policy for failed deliveries.

use crate::error::{MailError, MailResult};
use chrono::{DateTime, Utc};
use forum_config::{BackoffStrategy, MailQueueConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest wait between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// How many attempts a job gets and how long to wait between them.
///
/// Delays grow strictly with the retry number until they reach
/// [`MAX_RETRY_DELAY`]. There is no jitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Backoff shape.
    pub strategy: BackoffStrategy,

    /// Failed attempts after which a job is given up.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Growth factor (exponential only).
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(5 * 60))
    }
}

impl RetryPolicy {
    /// `base * n` before the n-th retry.
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            strategy: BackoffStrategy::Linear,
            max_attempts,
            base_delay,
            multiplier: 1.0,
        }
    }

    /// `base * multiplier^(n-1)` before the n-th retry.
    pub fn exponential(max_attempts: u32, base_delay: Duration, multiplier: f64) -> MailResult<Self> {
        let policy = Self {
            strategy: BackoffStrategy::Exponential,
            max_attempts,
            base_delay,
            multiplier,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Rejects settings under which delays would not grow.
    pub fn validate(&self) -> MailResult<()> {
        if self.max_attempts == 0 {
            return Err(MailError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay.is_zero() {
            return Err(MailError::Configuration(
                "base backoff delay must be positive".to_string(),
            ));
        }
        if self.base_delay > MAX_RETRY_DELAY {
            return Err(MailError::Configuration(format!(
                "base backoff delay must not exceed {}s",
                MAX_RETRY_DELAY.as_secs()
            )));
        }
        if self.strategy == BackoffStrategy::Exponential
            && !(self.multiplier.is_finite() && self.multiplier > 1.0)
        {
            return Err(MailError::Configuration(format!(
                "exponential backoff multiplier must be greater than 1.0, got {}",
                self.multiplier
            )));
        }
        Ok(())
    }

    /// Whether a job with `failed_attempts` failures is done for good.
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_attempts
    }

    /// Delay before retry number `retry` (1-based), capped at
    /// [`MAX_RETRY_DELAY`].
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let delay = match self.strategy {
            BackoffStrategy::Linear => self.base_delay.saturating_mul(retry),
            BackoffStrategy::Exponential => {
                let factor = self.multiplier.powi((retry - 1).min(i32::MAX as u32) as i32);
                Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
                    .unwrap_or(Duration::MAX)
            }
        };
        delay.min(MAX_RETRY_DELAY)
    }

    /// When the next attempt may run after the `failed_attempts`-th failure,
    /// or `None` once the attempts are exhausted.
    pub fn next_attempt_at(&self, now: DateTime<Utc>, failed_attempts: u32) -> Option<DateTime<Utc>> {
        if self.is_exhausted(failed_attempts) {
            return None;
        }
        let next = chrono::Duration::from_std(self.delay_for_retry(failed_attempts))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Some(next)
    }
}

impl TryFrom<&MailQueueConfig> for RetryPolicy {
    type Error = MailError;

    fn try_from(config: &MailQueueConfig) -> Result<Self, Self::Error> {
        let policy = Self {
            strategy: config.backoff_strategy,
            max_attempts: config.max_attempts,
            base_delay: config.backoff_base(),
            multiplier: config.backoff_multiplier,
        };
        policy.validate()?;
        Ok(policy)
    }
}
