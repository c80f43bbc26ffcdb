//! Retry delay policy for failed loads.
//!
//! Exponential backoff with random jitter, so pagers that failed together
//! (for example after the feed came back) do not retry in lockstep.
//!
//! Formula: min(30s, 2^attempt seconds + random(0..1000ms))

use std::time::Duration;

/// Upper bound for any single delay.
pub const MAX_DELAY: Duration = Duration::from_secs(30);

const MAX_JITTER_MS: u64 = 1000;

/// Tracks consecutive failures and hands out the next retry delay.
#[derive(Debug, Clone, Default)]
pub struct RetryBackoff {
    attempt: u32,
}

impl RetryBackoff {
    /// Fresh policy, no failures recorded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of failures since the last success.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        delay_for(self.attempt)
    }

    /// Record a success.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Delay for the given 1-based attempt number.
pub fn delay_for(attempt: u32) -> Duration {
    let base = Duration::from_secs(2u64.pow(attempt.min(5)));
    let jitter = Duration::from_millis(random_jitter_ms());
    (base + jitter).min(MAX_DELAY)
}

/// Random jitter in 0..=1000 milliseconds. Zero if the OS RNG is unavailable.
fn random_jitter_ms() -> u64 {
    let mut bytes = [0u8; 8];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => u64::from_le_bytes(bytes) % (MAX_JITTER_MS + 1),
        Err(_) => 0,
    }
}
