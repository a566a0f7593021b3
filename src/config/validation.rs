//! Configuration validation.
//!
//! Semantic checks only; serde handles syntax. Returns every problem found,
//! not just the first, so an operator can fix the file in one pass.

use std::collections::HashSet;
use thiserror::Error;

use crate::config::schema::WorkerConfig;
use crate::resilience::RetryPolicy;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("seed phrase is missing")]
    MissingSeedPhrase,

    #[error("chain.api_url '{0}' is not a valid http(s) URL")]
    InvalidApiUrl(String),

    #[error("chain.gas_adjustment must be a positive finite number")]
    InvalidGasAdjustment,

    #[error("chain.denom must not be empty")]
    EmptyDenom,

    #[error("{0}.max_attempts must be at least 1")]
    ZeroAttempts(&'static str),

    #[error("no topics configured")]
    NoTopics,

    #[error("topic {0} is configured more than once")]
    DuplicateTopic(u64),

    #[error("topic {topic_id}: inference_url '{url}' is not a valid http(s) URL")]
    InvalidInferenceUrl { topic_id: u64, url: String },
}

/// Validate a loaded configuration.
pub fn validate_config(config: &WorkerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.seed_phrase.trim().is_empty() {
        errors.push(ValidationError::MissingSeedPhrase);
    }

    if !is_http_url(&config.chain.api_url) {
        errors.push(ValidationError::InvalidApiUrl(config.chain.api_url.clone()));
    }

    let adjustment = config.chain.gas_adjustment;
    if !adjustment.is_finite() || adjustment <= 0.0 {
        errors.push(ValidationError::InvalidGasAdjustment);
    }

    if config.chain.denom.trim().is_empty() {
        errors.push(ValidationError::EmptyDenom);
    }

    let policies: [(&'static str, &RetryPolicy); 4] = [
        ("submission.simulate", &config.submission.simulate),
        ("submission.broadcast", &config.submission.broadcast),
        ("submission.confirm", &config.submission.confirm),
        ("onboarding", &config.onboarding),
    ];
    for (name, policy) in policies {
        if policy.max_attempts == 0 {
            errors.push(ValidationError::ZeroAttempts(name));
        }
    }

    if config.topics.is_empty() {
        errors.push(ValidationError::NoTopics);
    }

    let mut seen = HashSet::new();
    for topic in &config.topics {
        if !seen.insert(topic.topic_id) {
            errors.push(ValidationError::DuplicateTopic(topic.topic_id));
        }
        if !is_http_url(&topic.inference_url) {
            errors.push(ValidationError::InvalidInferenceUrl {
                topic_id: topic.topic_id,
                url: topic.inference_url.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_http_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TopicConfig;

    fn valid_config() -> WorkerConfig {
        WorkerConfig {
            seed_phrase: "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about".to_string(),
            topics: vec![TopicConfig::new(1, "http://localhost:8000/inference/1")],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = valid_config();
        config.seed_phrase = "  ".to_string();
        config.chain.gas_adjustment = f64::NAN;
        config.topics.push(TopicConfig::new(1, "not a url"));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MissingSeedPhrase));
        assert!(errors.contains(&ValidationError::InvalidGasAdjustment));
        assert!(errors.contains(&ValidationError::DuplicateTopic(1)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidInferenceUrl { topic_id: 1, .. })));
    }

    #[test]
    fn test_empty_topic_list_is_fatal() {
        let mut config = valid_config();
        config.topics.clear();
        assert_eq!(validate_config(&config).unwrap_err(), vec![ValidationError::NoTopics]);
    }

    #[test]
    fn test_zero_attempt_policy_rejected() {
        let mut config = valid_config();
        config.submission.broadcast.max_attempts = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::ZeroAttempts("submission.broadcast")]);
    }
}
