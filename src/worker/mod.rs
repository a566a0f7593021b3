//! Topic workers.
//!
//! # Data Flow
//! ```text
//! TopicWorker (one task per topic)
//!     → ChainQuery (activity, whitelist, registration, nonce)
//!     → InferenceSource (value for a new nonce, bounded retries)
//!     → Identity::submit (serialized across all workers)
//! ```

pub mod inference;
pub mod topic;

pub use inference::{HttpInferenceSource, InferenceError, InferenceSource, InferenceValue};
pub use topic::{PollOutcome, StopReason, TopicWorker, WorkerError};
