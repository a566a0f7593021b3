//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::{
    default_inference_retries, default_inference_retry_interval_secs,
    default_polling_interval_secs, WorkerConfig, SEED_PHRASE_ENV_VAR,
};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A per-topic setting that was zero in the file and got its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultedSetting {
    pub topic_id: u64,
    pub field: &'static str,
    pub value: u64,
}

/// Validated configuration plus the defaults applied while loading.
///
/// Loading runs before logging exists, so the defaults are reported back
/// for the caller to log.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: WorkerConfig,
    pub defaulted: Vec<DefaultedSetting>,
}

/// Load and validate configuration from a TOML file.
///
/// The seed phrase from [`SEED_PHRASE_ENV_VAR`] takes precedence over the
/// file so the secret can stay out of it.
pub fn load_config(path: &Path) -> Result<LoadedConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let seed_override = std::env::var(SEED_PHRASE_ENV_VAR).ok();
    parse_config(&content, seed_override)
}

/// Parse, normalize and validate configuration text.
pub fn parse_config(content: &str, seed_override: Option<String>) -> Result<LoadedConfig, ConfigError> {
    let mut config: WorkerConfig = toml::from_str(content)?;

    if let Some(seed) = seed_override.filter(|s| !s.trim().is_empty()) {
        config.seed_phrase = seed;
    }

    let defaulted = apply_topic_defaults(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(LoadedConfig { config, defaulted })
}

/// Replace zero per-topic settings with defaults and list what changed.
pub fn apply_topic_defaults(config: &mut WorkerConfig) -> Vec<DefaultedSetting> {
    let mut defaulted = Vec::new();
    for topic in &mut config.topics {
        let topic_id = topic.topic_id;
        let mut note = |field, value| {
            defaulted.push(DefaultedSetting {
                topic_id,
                field,
                value,
            })
        };
        if topic.polling_interval_secs == 0 {
            topic.polling_interval_secs = default_polling_interval_secs();
            note("polling_interval_secs", topic.polling_interval_secs);
        }
        if topic.inference_retries == 0 {
            topic.inference_retries = default_inference_retries();
            note("inference_retries", u64::from(topic.inference_retries));
        }
        if topic.inference_retry_interval_secs == 0 {
            topic.inference_retry_interval_secs = default_inference_retry_interval_secs();
            note("inference_retry_interval_secs", topic.inference_retry_interval_secs);
        }
    }
    defaulted
}
