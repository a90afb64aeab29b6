use std::thread;
use std::time::Duration;

/// Every portal navigation gets exactly one retry.
pub const NAVIGATION_RETRIES: usize = 1;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn navigation(delay: Duration) -> Self {
        Self {
            retries: NAVIGATION_RETRIES,
            delay,
        }
    }
}

#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: usize,
    pub last_error: E,
}

/// Run `op` up to `policy.retries + 1` times, sleeping `policy.delay`
/// between attempts. Every failed attempt is logged under `label`.
pub fn with_retry<T, E, F>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut() -> Result<T, E>,
{
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt <= policy.retries => {
                tracing::warn!(
                    step = label,
                    attempt,
                    error = %err,
                    "step failed; retrying"
                );
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
            Err(err) => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }
        }
    }
}
