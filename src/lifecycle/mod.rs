//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Keys → chain client → node check → identity → orchestrator
//!
//! Run (orchestrator.rs):
//!     One task per topic → JoinSet drain → RunReport
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger → every worker stops at its next checkpoint
//! ```
//!
//! # Design Decisions
//! - Startup is ordered and fails fast, before any worker runs
//! - No forced preemption: in-flight submissions complete
//! - Stopped workers are never restarted

pub mod orchestrator;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use orchestrator::{Orchestrator, RunReport};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{bootstrap, bootstrap_with, StartupError};
