//! Bounded exponential retry for post-processing tasks.

use crate::config::RetryPolicy;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;

/// Result of a retried operation plus how many attempts it took.
#[derive(Debug)]
pub struct Retried<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

fn backoff_for(policy: &RetryPolicy) -> ExponentialBackoff {
    let mut b = ExponentialBackoff {
        initial_interval: policy.initial_delay,
        current_interval: policy.initial_delay,
        max_interval: policy.max_delay,
        multiplier: policy.multiplier,
        randomization_factor: 0.0,
        max_elapsed_time: None,
        ..Default::default()
    };
    b.reset();
    b
}

/// Delays slept between attempts for `policy` (one fewer than `max_attempts`).
pub fn delays(policy: &RetryPolicy) -> Vec<Duration> {
    let mut b = backoff_for(policy);
    (1..policy.max_attempts.max(1))
        .filter_map(|_| b.next_backoff())
        .collect()
}

/// Runs `op` until it succeeds or `policy.max_attempts` is reached, sleeping
/// `initial_delay * multiplier^n` (capped at `max_delay`) between attempts.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Retried<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = backoff_for(policy);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => {
                return Retried {
                    result: Ok(v),
                    attempts: attempt,
                }
            }
            Err(e) if attempt >= max_attempts => {
                return Retried {
                    result: Err(e),
                    attempts: attempt,
                }
            }
            Err(e) => {
                let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
                tracing::debug!(attempt, ?delay, error = %e, "attempt failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
