//! Caller-level retry on model rate limiting.

use std::time::Duration;

use anyhow::Result;
use tracing::warn;

use crate::core::backoff::RetryPolicy;
use crate::io::model::ModelError;

/// Rate limiting persisted through every attempt of the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit persisted after {attempts} attempts")]
pub struct RateLimitExhausted {
    pub attempts: u32,
}

/// Whether any error in the chain is a model rate-limit error.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<ModelError>()
            .is_some_and(ModelError::is_rate_limited)
    })
}

/// Run `op` until it succeeds, fails with anything other than rate limiting,
/// or the policy runs out of attempts.
///
/// `op` receives the zero-based attempt number. `sleep` is called with each
/// delay from the policy; pass `std::thread::sleep` outside tests.
pub fn run_with_retry<T, F, S>(policy: &RetryPolicy, mut sleep: S, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
    S: FnMut(Duration),
{
    let mut attempt = 0u32;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if is_rate_limited(&err) => {
                let Some(delay) = policy.delay_after(attempt) else {
                    return Err(err.context(RateLimitExhausted {
                        attempts: attempt + 1,
                    }));
                };
                warn!(
                    attempt = attempt + 1,
                    wait_secs = delay.as_secs(),
                    "rate limited, retrying"
                );
                sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            delays: vec![Duration::from_secs(12), Duration::from_secs(24)],
        }
    }

    fn throttled() -> anyhow::Error {
        anyhow::Error::new(ModelError::RateLimited { retry_after: None })
    }

    #[test]
    fn retries_rate_limits_on_schedule() {
        let mut waits = Vec::new();
        let value = run_with_retry(
            &policy(),
            |d| waits.push(d),
            |attempt| {
                if attempt < 2 {
                    Err(throttled())
                } else {
                    Ok(attempt)
                }
            },
        )
        .expect("third attempt succeeds");
        assert_eq!(value, 2);
        assert_eq!(waits, vec![Duration::from_secs(12), Duration::from_secs(24)]);
    }

    #[test]
    fn gives_up_after_configured_attempts() {
        let mut calls = 0;
        let err = run_with_retry(
            &policy(),
            |_| {},
            |_| -> Result<()> {
                calls += 1;
                Err(throttled())
            },
        )
        .unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(
            err.downcast_ref::<RateLimitExhausted>(),
            Some(&RateLimitExhausted { attempts: 3 })
        );
    }

    #[test]
    fn other_errors_propagate_immediately() {
        let mut calls = 0;
        let err = run_with_retry(
            &policy(),
            |_| panic!("should not sleep"),
            |_| -> Result<()> {
                calls += 1;
                Err(anyhow!("disk full"))
            },
        )
        .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn detects_rate_limit_behind_context() {
        let err = Err::<(), _>(throttled()).context("planner").unwrap_err();
        assert!(is_rate_limited(&err));
        assert!(!is_rate_limited(&anyhow!("boom")));
    }
}
