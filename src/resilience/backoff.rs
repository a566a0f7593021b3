//! Delay calculation between retry attempts.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay after every failed attempt.
    #[default]
    Fixed,
    /// Doubling delay with up to 10% jitter, capped at `max_ms`.
    Exponential,
}

/// Delay to wait after the given failed attempt (1-based).
pub fn delay_for(kind: BackoffKind, attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    match kind {
        BackoffKind::Fixed => Duration::from_millis(base_ms),
        BackoffKind::Exponential => calculate_backoff(attempt, base_ms, max_ms),
    }
}

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
