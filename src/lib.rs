//! Inference worker node library.
//!
//! Serves a set of topics on a Cosmos-style chain for a single wallet:
//! each topic worker watches for new unfulfilled nonces, fetches a value
//! from its inference endpoint and submits it through the shared
//! [`blockchain::Identity`], which serializes every transaction.

pub mod blockchain;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod worker;

pub use blockchain::{Identity, SubmissionOutcome};
pub use config::schema::WorkerConfig;
pub use lifecycle::{Orchestrator, RunReport, Shutdown};
