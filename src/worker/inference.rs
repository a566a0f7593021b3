//! External inference value source.
//!
//! A single GET against the topic's configured URL. The body is a plain
//! decimal number; anything else means "no value this attempt".

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(String),

    #[error("inference endpoint returned status {0}")]
    Status(u16),

    #[error("inference response is not a finite number: {0:?}")]
    Unparsable(String),
}

/// A validated inference value.
///
/// `raw` is the trimmed body text and is what gets submitted, so no float
/// formatting ever changes the value.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceValue {
    pub raw: String,
    pub value: f64,
}

impl InferenceValue {
    pub fn parse(body: &str) -> Result<Self, InferenceError> {
        let raw = body.trim();
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Self {
                raw: raw.to_string(),
                value,
            }),
            _ => Err(InferenceError::Unparsable(raw.to_string())),
        }
    }
}

#[async_trait]
pub trait InferenceSource: Send + Sync {
    /// Fetch the current value from `url`. One attempt, no retries.
    async fn fetch(&self, url: &str) -> Result<InferenceValue, InferenceError>;
}

/// reqwest-backed source shared by all topic workers.
#[derive(Debug, Clone)]
pub struct HttpInferenceSource {
    http: Client,
}

impl HttpInferenceSource {
    pub fn new() -> Result<Self, InferenceError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl InferenceSource for HttpInferenceSource {
    async fn fetch(&self, url: &str) -> Result<InferenceValue, InferenceError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;
        InferenceValue::parse(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_raw_text() {
        let value = InferenceValue::parse(" 2981.0300000001\n").unwrap();
        assert_eq!(value.raw, "2981.0300000001");
        assert!((value.value - 2981.03).abs() < 1e-6);

        let value = InferenceValue::parse("-1e-3").unwrap();
        assert_eq!(value.raw, "-1e-3");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(InferenceValue::parse(""), Err(InferenceError::Unparsable(_))));
        assert!(matches!(InferenceValue::parse("{\"value\": 1}"), Err(InferenceError::Unparsable(_))));
        assert!(matches!(InferenceValue::parse("NaN"), Err(InferenceError::Unparsable(_))));
        assert!(matches!(InferenceValue::parse("inf"), Err(InferenceError::Unparsable(_))));
    }
}
