//! Retry budget and backoff shape for operation execution.

use std::time::Duration;

use anyhow::{Result, anyhow};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// How many attempts an operation gets and how long to wait between them.
///
/// The delay before retry `n` (0-indexed, so retry 0 follows the first
/// failure) is `min(delay_ms * 2^n, max_delay_ms)` plus a uniform jitter in
/// `[0, max_jitter_ms]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total handler invocations allowed, including the first one.
    pub attempts: u32,
    /// Base delay before the first retry.
    pub delay_ms: u64,
    /// Upper bound for the exponential part of the delay.
    pub max_delay_ms: u64,
    /// Upper bound for the random part of the delay.
    pub max_jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay_ms: 100,
            max_delay_ms: 30_000,
            max_jitter_ms: 100,
        }
    }
}

impl RetryPolicy {
    /// Policy with the default attempt budget and no waiting between attempts.
    pub fn immediate() -> Self {
        Self {
            delay_ms: 0,
            max_delay_ms: 0,
            max_jitter_ms: 0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.attempts == 0 {
            return Err(anyhow!("retry.attempts must be > 0"));
        }
        if self.max_delay_ms < self.delay_ms {
            return Err(anyhow!(
                "retry.max_delay_ms ({}) must be >= retry.delay_ms ({})",
                self.max_delay_ms,
                self.delay_ms
            ));
        }
        Ok(())
    }

    /// Deterministic exponential part of the delay before retry `retry_index`.
    pub fn backoff(&self, retry_index: u32) -> Duration {
        let factor = 1u64.checked_shl(retry_index).unwrap_or(u64::MAX);
        let millis = self.delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Full delay before retry `retry_index`, jitter included.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let jitter = if self.max_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=self.max_jitter_ms)
        };
        self.backoff(retry_index) + Duration::from_millis(jitter)
    }
}
