//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + WORKER_SEED_PHRASE
//!     → loader.rs (parse, env override, per-topic defaults)
//!     → validation.rs (semantic checks)
//!     → WorkerConfig (validated, immutable)
//!     → handed to lifecycle::startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults except the topic list
//! - Any validation failure aborts before a worker starts

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, DefaultedSetting, LoadedConfig};
pub use schema::{ChainConfig, ObservabilityConfig, SubmissionConfig, TopicConfig, WorkerConfig};
