use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;
use crate::types::{Attempt, Outcome, Reply};

/// Exponential backoff for transient Places statuses:
/// `base^(attempt-1) + step·attempt` seconds, attempts counted from 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: f64,
    pub step: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            base: 1.7,
            step: 0.25,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        Duration::from_secs_f64(self.base.powi(exp) + self.step * attempt as f64)
    }
}

/// Run `call` until it yields a non-transient attempt or the policy is
/// exhausted. Errors from `call` (transport, parse) are returned at once.
pub async fn retry_transient<T, F, Fut>(policy: &RetryPolicy, op: &str, mut call: F) -> Result<Reply<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let max = policy.max_attempts.max(1);
    for attempt in 1..=max {
        let outcome = match call().await? {
            Attempt::Success(v) => Outcome::Success(v),
            Attempt::ZeroResults => Outcome::ZeroResults,
            Attempt::Fatal { status, message } => Outcome::Fatal { status, message },
            Attempt::Transient(status) => {
                if attempt < max {
                    let wait = policy.delay(attempt);
                    warn!(
                        op,
                        attempt,
                        status = %status,
                        wait_secs = wait.as_secs_f64(),
                        "Transient Places status, retrying after backoff"
                    );
                    tokio::time::sleep(wait).await;
                } else {
                    warn!(op, attempt, status = %status, "Transient Places status, out of attempts");
                }
                continue;
            }
        };
        return Ok(Reply {
            outcome,
            attempts: attempt,
        });
    }

    Ok(Reply {
        outcome: Outcome::ExhaustedRetries,
        attempts: max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_follow_documented_curve() {
        let policy = RetryPolicy::default();
        assert!((policy.delay(1).as_secs_f64() - 1.25).abs() < 1e-9);
        assert!((policy.delay(2).as_secs_f64() - 2.2).abs() < 1e-9);
        assert!((policy.delay(3).as_secs_f64() - (1.7f64 * 1.7 + 0.75)).abs() < 1e-9);
    }
}
