//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! Seed phrase
//!     → keys.rs (HD derivation, address, deterministic signing)
//!     → wallet.rs (Identity: account cache + serialized submit)
//!     → pipeline.rs (simulate, fee, sign, broadcast, confirm)
//!     → transaction.rs + proto.rs (typestate builder, protobuf encoding)
//!     → client.rs (LCD REST calls with timeouts)
//! ```
//!
//! # Security Constraints
//! - Never log the seed phrase or private key
//! - All chain calls have a request timeout
//! - Only `Identity::submit` mutates sequence and balance

pub mod client;
pub mod keys;
pub mod pipeline;
pub mod proto;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::LcdClient;
pub use keys::KeyPair;
pub use pipeline::{SubmissionOutcome, SubmissionSettings};
pub use types::{ChainError, ChainQuery, ChainResult};
pub use wallet::{Identity, TxMessage};
