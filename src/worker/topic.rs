//! Per-topic worker: onboarding, then the nonce polling loop.
//!
//! # States
//! ```text
//! Onboarding ──▶ Polling ──▶ Stopped
//!      │                        ▲
//!      └────────────────────────┘  (inactive, not whitelisted, registration failed)
//! ```
//!
//! A worker never returns an error; it returns the [`StopReason`] that
//! ended it. Cancellation is observed at the top of every iteration and
//! on both sides of the polling sleep. An in-flight submission always runs
//! to completion first.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::types::{ChainError, ChainQuery, ChainResult};
use crate::blockchain::{Identity, SubmissionOutcome};
use crate::config::TopicConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::{retry, Attempt, RetryPolicy};
use crate::worker::inference::{InferenceSource, InferenceValue};

/// Why a worker reached `Stopped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    TopicInactive,
    NotWhitelisted,
    RegistrationFailed,
    OnboardingQueryFailed(String),
    Failed(String),
    Panicked(String),
}

impl StopReason {
    /// Whether the stop points at a problem an operator should look at.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            StopReason::RegistrationFailed
                | StopReason::OnboardingQueryFailed(_)
                | StopReason::Failed(_)
                | StopReason::Panicked(_)
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::TopicInactive => write!(f, "topic is not active"),
            StopReason::NotWhitelisted => write!(f, "wallet is not whitelisted for the topic"),
            StopReason::RegistrationFailed => write!(f, "registration failed"),
            StopReason::OnboardingQueryFailed(reason) => write!(f, "onboarding query failed: {reason}"),
            StopReason::Failed(reason) => write!(f, "failed: {reason}"),
            StopReason::Panicked(reason) => write!(f, "panicked: {reason}"),
        }
    }
}

/// Conditions that end the polling loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("shutdown requested")]
    Cancelled,

    #[error("topic {0} is not active anymore")]
    TopicInactive(u64),

    #[error("cannot query {what}: {source}")]
    Query {
        what: &'static str,
        #[source]
        source: ChainError,
    },
}

impl From<WorkerError> for StopReason {
    fn from(error: WorkerError) -> Self {
        match error {
            WorkerError::Cancelled => StopReason::Cancelled,
            WorkerError::TopicInactive(_) => StopReason::TopicInactive,
            error @ WorkerError::Query { .. } => StopReason::Failed(error.to_string()),
        }
    }
}

/// Result of one polling iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Chain nonce is zero or already served.
    Idle { nonce: u64 },
    /// A chain query failed transiently; nothing was done this round.
    Skipped,
    /// New nonce found, but no inference value could be fetched.
    NoValue { nonce: u64 },
    /// A value was submitted for `nonce`.
    Submitted {
        nonce: u64,
        outcome: SubmissionOutcome,
    },
}

/// Serves one topic for the identity.
pub struct TopicWorker {
    topic: TopicConfig,
    identity: Arc<Identity>,
    client: Arc<dyn ChainQuery>,
    source: Arc<dyn InferenceSource>,
    onboarding: RetryPolicy,
    last_used_nonce: u64,
}

impl TopicWorker {
    pub fn new(
        topic: TopicConfig,
        identity: Arc<Identity>,
        client: Arc<dyn ChainQuery>,
        source: Arc<dyn InferenceSource>,
        onboarding: RetryPolicy,
    ) -> Self {
        Self {
            topic,
            identity,
            client,
            source,
            onboarding,
            last_used_nonce: 0,
        }
    }

    /// Start from a known nonce instead of zero.
    pub fn with_last_used_nonce(mut self, nonce: u64) -> Self {
        self.last_used_nonce = nonce;
        self
    }

    pub fn topic_id(&self) -> u64 {
        self.topic.topic_id
    }

    /// Highest nonce this worker has acted on.
    pub fn last_used_nonce(&self) -> u64 {
        self.last_used_nonce
    }

    /// Run onboarding and then poll until stopped.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) -> StopReason {
        let reason = if shutdown.is_triggered() {
            StopReason::Cancelled
        } else {
            match self.onboard().await {
                Ok(()) => self.poll_loop(&mut shutdown).await,
                Err(reason) => reason,
            }
        };

        if reason.is_failure() {
            tracing::error!(reason = %reason, "Worker stopped");
        } else {
            tracing::info!(reason = %reason, "Worker stopped");
        }
        reason
    }

    /// Activity, whitelist and registration checks.
    pub async fn onboard(&self) -> Result<(), StopReason> {
        let topic_id = self.topic.topic_id;
        let address = self.identity.address().to_string();

        if !self
            .query("check topic activity", |c| async move { c.is_topic_active(topic_id).await })
            .await?
        {
            tracing::warn!("Topic is not active, execution aborted");
            return Err(StopReason::TopicInactive);
        }

        let gated = self
            .query("check topic whitelist", |c| async move {
                c.is_topic_whitelist_enabled(topic_id).await
            })
            .await?;
        if gated {
            let listed = self
                .query("check whitelist membership", |c| {
                    let address = address.clone();
                    async move { c.is_whitelisted(topic_id, &address).await }
                })
                .await?;
            if !listed {
                tracing::warn!(address = %address, "Wallet is not whitelisted for the topic, execution aborted");
                return Err(StopReason::NotWhitelisted);
            }
        }

        let registered = self
            .query("check registration", |c| {
                let address = address.clone();
                async move { c.is_registered(topic_id, &address).await }
            })
            .await?;
        if !registered {
            tracing::info!("Wallet is not registered for the topic, registering");
            let outcome = self.identity.register(topic_id).await;
            if !outcome.is_confirmed() {
                tracing::error!(outcome = outcome.label(), "Worker cannot be registered, execution aborted");
                return Err(StopReason::RegistrationFailed);
            }
        }

        // The topic may have been deactivated while we registered.
        if !self
            .query("check topic activity", |c| async move { c.is_topic_active(topic_id).await })
            .await?
        {
            tracing::warn!("Topic is not active, execution aborted");
            return Err(StopReason::TopicInactive);
        }

        tracing::info!("Onboarding complete");
        Ok(())
    }

    async fn query<T, F, Fut>(&self, what: &str, op: F) -> Result<T, StopReason>
    where
        F: Fn(Arc<dyn ChainQuery>) -> Fut,
        Fut: Future<Output = ChainResult<T>>,
    {
        retry(&self.onboarding, what, |_| {
            let call = op(Arc::clone(&self.client));
            async move {
                call.await.map_err(|e| {
                    if e.is_transient() {
                        Attempt::Transient(e)
                    } else {
                        Attempt::Fatal(e)
                    }
                })
            }
        })
        .await
        .map_err(|e| {
            let reason = format!("{what}: {}", e.into_inner());
            tracing::error!(reason = %reason, "Onboarding query failed");
            StopReason::OnboardingQueryFailed(reason)
        })
    }

    async fn poll_loop(&mut self, shutdown: &mut ShutdownSignal) -> StopReason {
        tracing::info!(
            polling_interval_secs = self.topic.polling_interval_secs,
            "Worker started polling"
        );

        loop {
            if shutdown.is_triggered() {
                return StopReason::Cancelled;
            }

            match self.poll_once(shutdown).await {
                Ok(outcome) => tracing::debug!(outcome = ?outcome, "Polling iteration finished"),
                Err(e) => return e.into(),
            }

            if shutdown.is_triggered() {
                return StopReason::Cancelled;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.topic.polling_interval()) => {}
                _ = shutdown.triggered() => return StopReason::Cancelled,
            }
        }
    }

    /// One polling iteration: activity check, nonce check, fetch, submit.
    pub async fn poll_once(&mut self, shutdown: &mut ShutdownSignal) -> Result<PollOutcome, WorkerError> {
        let topic_id = self.topic.topic_id;

        match self.client.is_topic_active(topic_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Topic is not active anymore, aborting further execution");
                return Err(WorkerError::TopicInactive(topic_id));
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "Cannot check topic activity, skipping iteration");
                return Ok(PollOutcome::Skipped);
            }
            Err(source) => {
                return Err(WorkerError::Query {
                    what: "topic activity",
                    source,
                })
            }
        }

        let nonce = match self.client.unfulfilled_nonce(topic_id).await {
            Ok(nonce) => nonce,
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "Cannot fetch worker nonce, skipping iteration");
                return Ok(PollOutcome::Skipped);
            }
            Err(source) => {
                return Err(WorkerError::Query {
                    what: "worker nonce",
                    source,
                })
            }
        };

        if nonce == 0 || nonce <= self.last_used_nonce {
            tracing::debug!(nonce = nonce, last_used_nonce = self.last_used_nonce, "No new worker nonce found");
            return Ok(PollOutcome::Idle { nonce });
        }

        tracing::info!(nonce = nonce, "Found new worker nonce, requesting inference");
        let value = match self.fetch_value(shutdown).await? {
            Some(value) => value,
            None => {
                metrics::record_inference_failure(topic_id);
                tracing::warn!(
                    nonce = nonce,
                    url = %self.topic.inference_url,
                    "Failed to fetch inference value, is the inference endpoint available?"
                );
                return Ok(PollOutcome::NoValue { nonce });
            }
        };

        tracing::info!(nonce = nonce, value = %value.raw, "Inference value received");
        let outcome = self.identity.submit_inference(topic_id, nonce, value.raw).await;
        // The nonce is spent whatever the outcome.
        self.last_used_nonce = nonce;

        Ok(PollOutcome::Submitted { nonce, outcome })
    }

    async fn fetch_value(&self, shutdown: &mut ShutdownSignal) -> Result<Option<InferenceValue>, WorkerError> {
        let policy = self.topic.inference_policy();
        let source = &self.source;
        let url = self.topic.inference_url.as_str();

        let fetch = retry(&policy, "fetch inference", |_| async move {
            source.fetch(url).await.map_err(Attempt::Transient)
        });

        tokio::select! {
            result = fetch => Ok(result.ok()),
            _ = shutdown.triggered() => Err(WorkerError::Cancelled),
        }
    }
}

impl fmt::Debug for TopicWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicWorker")
            .field("topic_id", &self.topic.topic_id)
            .field("last_used_nonce", &self.last_used_nonce)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_reason_from_worker_error() {
        assert_eq!(StopReason::from(WorkerError::Cancelled), StopReason::Cancelled);
        assert_eq!(StopReason::from(WorkerError::TopicInactive(3)), StopReason::TopicInactive);

        let reason = StopReason::from(WorkerError::Query {
            what: "worker nonce",
            source: ChainError::Protocol("missing field".into()),
        });
        assert!(matches!(&reason, StopReason::Failed(msg) if msg.contains("worker nonce")));
        assert!(reason.is_failure());
        assert!(!StopReason::Cancelled.is_failure());
        assert!(!StopReason::NotWhitelisted.is_failure());
    }
}
