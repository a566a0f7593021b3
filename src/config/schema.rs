//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the worker
//! node. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::RetryPolicy;

/// Environment variable that overrides `seed_phrase` from the file.
pub const SEED_PHRASE_ENV_VAR: &str = "WORKER_SEED_PHRASE";

/// Root configuration for the worker node.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WorkerConfig {
    /// BIP-39 mnemonic of the wallet. Never logged.
    pub seed_phrase: String,

    /// Force debug-level logging for this crate.
    pub debug: bool,

    /// Chain endpoint and fee settings.
    pub chain: ChainConfig,

    /// Retry budgets of the transaction pipeline stages.
    pub submission: SubmissionConfig,

    /// Retry budget for the read-only onboarding queries.
    pub onboarding: RetryPolicy,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Topics to serve, one worker each.
    pub topics: Vec<TopicConfig>,
}

impl std::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("seed_phrase", &"<redacted>")
            .field("debug", &self.debug)
            .field("chain", &self.chain)
            .field("submission", &self.submission)
            .field("onboarding", &self.onboarding)
            .field("observability", &self.observability)
            .field("topics", &self.topics)
            .finish()
    }
}

/// Chain (LCD) endpoint and transaction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Base URL of the LCD REST API.
    pub api_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Fee and balance denomination.
    pub denom: String,

    /// Bech32 human-readable prefix of account addresses.
    pub address_prefix: String,

    /// Multiplier applied to simulated gas (1.5 = 50% buffer).
    pub gas_adjustment: f64,

    /// Blocks after the latest height at which a transaction expires.
    pub timeout_height_offset: u64,
}

impl ChainConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:1317".to_string(),
            request_timeout_secs: 15,
            denom: "uallo".to_string(),
            address_prefix: "allo".to_string(),
            gas_adjustment: 1.5,
            timeout_height_offset: 50,
        }
    }
}

/// Retry budgets of the submission pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Gas simulation attempts (Draft → Simulated).
    pub simulate: RetryPolicy,

    /// Broadcast attempts on transport failure (Signed → Broadcast).
    pub broadcast: RetryPolicy,

    /// Inclusion polls (Broadcast → Confirmed/TimedOut).
    pub confirm: RetryPolicy,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            simulate: RetryPolicy::fixed(3, 1000),
            broadcast: RetryPolicy::fixed(5, 3000),
            confirm: RetryPolicy::fixed(10, 3000),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9100".to_string(),
        }
    }
}

/// One topic served by one worker.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicConfig {
    /// On-chain topic identifier.
    pub topic_id: u64,

    /// Endpoint returning the inference value as a plain decimal body.
    pub inference_url: String,

    /// Seconds between unfulfilled nonce checks.
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,

    /// Inference fetch attempts per new nonce.
    #[serde(default = "default_inference_retries")]
    pub inference_retries: u32,

    /// Seconds between inference fetch attempts.
    #[serde(default = "default_inference_retry_interval_secs")]
    pub inference_retry_interval_secs: u64,
}

impl TopicConfig {
    pub fn new(topic_id: u64, inference_url: impl Into<String>) -> Self {
        Self {
            topic_id,
            inference_url: inference_url.into(),
            polling_interval_secs: default_polling_interval_secs(),
            inference_retries: default_inference_retries(),
            inference_retry_interval_secs: default_inference_retry_interval_secs(),
        }
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    /// Fetch policy derived from the per-topic retry fields.
    pub fn inference_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.inference_retries,
            self.inference_retry_interval_secs.saturating_mul(1000),
        )
    }
}

pub(crate) fn default_polling_interval_secs() -> u64 {
    5
}

pub(crate) fn default_inference_retries() -> u32 {
    5
}

pub(crate) fn default_inference_retry_interval_secs() -> u64 {
    3
}
