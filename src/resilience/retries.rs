//! Bounded retry policies.
//!
//! Every pipeline stage and every worker fetch owns a [`RetryPolicy`]; the
//! control flow never hard-codes attempt counts or delays. An operation
//! signals whether a failure is worth another attempt through [`Attempt`].

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::resilience::backoff::{delay_for, BackoffKind};

/// Attempt budget and delay for one retried operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never zero after validation.
    pub max_attempts: u32,
    /// Delay after a failed attempt, in milliseconds.
    pub delay_ms: u64,
    /// Delay growth.
    pub backoff: BackoffKind,
    /// Upper bound for exponential delays, in milliseconds.
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Fixed-delay policy.
    pub const fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
            backoff: BackoffKind::Fixed,
            max_delay_ms: delay_ms,
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        delay_for(self.backoff, attempt, self.delay_ms, self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, 1000)
    }
}

/// Failure of a single attempt.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Worth trying again while budget remains.
    Transient(E),
    /// Stop retrying immediately.
    Fatal(E),
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt failed transiently; holds the last error.
    Exhausted { attempts: u32, last: E },
    /// An attempt failed in a way that must not be retried.
    Aborted { attempts: u32, error: E },
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Aborted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// The error that ended the retry loop.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted { error, .. } => error,
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or the policy's budget is spent.
///
/// `op` receives the 1-based attempt number. `what` names the operation in
/// the warning logged after each transient failure.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Fatal(error)) => {
                return Err(RetryError::Aborted {
                    attempts: attempt,
                    error,
                })
            }
            Err(Attempt::Transient(error)) => {
                let left = max_attempts - attempt;
                if left == 0 {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: error,
                    });
                }

                tracing::warn!(
                    error = %error,
                    attempt = attempt,
                    retries_left = left,
                    "Could not {}, retrying",
                    what
                );
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}
