//! Fixed backoff schedule for rate-limited model calls.

use std::time::Duration;

/// Bounded retry policy: `attempts` tries total, waiting `delays[i]` after the
/// `i`-th failed try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delays: Vec::new(),
        }
    }

    /// Delay to wait after failed attempt `attempt` (zero-based), or `None`
    /// when no attempts remain.
    ///
    /// Attempts beyond the configured schedule reuse its last entry.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt + 1 >= self.attempts {
            return None;
        }
        let idx = attempt as usize;
        self.delays
            .get(idx)
            .or_else(|| self.delays.last())
            .copied()
            .or(Some(Duration::ZERO))
    }
}
