//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Stage that talks to the chain or the inference endpoint:
//!     → retries.rs (bounded attempts, transient vs. fatal classification)
//!     → backoff.rs (fixed or exponential delay between attempts)
//! ```
//!
//! # Design Decisions
//! - Budgets are bounded integers; every stage reaches a terminal state
//! - Request-level timeouts live on the HTTP clients, not here
//! - Policies are plain config values, tunable without touching control flow

pub mod backoff;
pub mod retries;

pub use backoff::BackoffKind;
pub use retries::{retry, Attempt, RetryError, RetryPolicy};
