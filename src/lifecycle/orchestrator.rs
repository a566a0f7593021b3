//! Runs one worker task per topic against the shared identity.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::blockchain::{ChainQuery, Identity};
use crate::config::TopicConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::worker::{InferenceSource, StopReason, TopicWorker};

/// How every topic worker ended, ordered by topic id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub stops: Vec<(u64, StopReason)>,
}

impl RunReport {
    pub fn reason(&self, topic_id: u64) -> Option<&StopReason> {
        self.stops
            .iter()
            .find(|(id, _)| *id == topic_id)
            .map(|(_, reason)| reason)
    }

    /// Topics that stopped on a failure.
    pub fn failures(&self) -> impl Iterator<Item = &(u64, StopReason)> {
        self.stops.iter().filter(|(_, reason)| reason.is_failure())
    }
}

/// Owner of the identity and of all worker tasks.
pub struct Orchestrator {
    identity: Arc<Identity>,
    client: Arc<dyn ChainQuery>,
    source: Arc<dyn InferenceSource>,
    topics: Vec<TopicConfig>,
    onboarding: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        identity: Arc<Identity>,
        client: Arc<dyn ChainQuery>,
        source: Arc<dyn InferenceSource>,
        topics: Vec<TopicConfig>,
        onboarding: RetryPolicy,
    ) -> Self {
        Self {
            identity,
            client,
            source,
            topics,
            onboarding,
        }
    }

    /// Spawn every worker and wait until all of them have stopped.
    ///
    /// Returns when each worker stopped on its own or after observing
    /// `shutdown`. A panicking worker is recorded and does not affect the
    /// others.
    pub async fn run(self, shutdown: &Shutdown) -> RunReport {
        let mut tasks = JoinSet::new();
        let mut topic_of = HashMap::new();

        for topic in self.topics {
            let topic_id = topic.topic_id;
            let worker = TopicWorker::new(
                topic,
                Arc::clone(&self.identity),
                Arc::clone(&self.client),
                Arc::clone(&self.source),
                self.onboarding.clone(),
            );
            let span = tracing::info_span!("worker", topic_id = topic_id);
            let handle = tasks.spawn(worker.run(shutdown.subscribe()).instrument(span));
            topic_of.insert(handle.id(), topic_id);
        }

        let mut active = topic_of.len();
        metrics::set_active_topics(active);
        tracing::info!(topics = active, address = %self.identity.address(), "Workers started");

        let mut stops = Vec::with_capacity(active);
        while let Some(joined) = tasks.join_next_with_id().await {
            let (topic_id, reason) = match joined {
                Ok((id, reason)) => (topic_of.get(&id).copied().unwrap_or_default(), reason),
                Err(e) => {
                    let topic_id = topic_of.get(&e.id()).copied().unwrap_or_default();
                    let reason = if e.is_panic() {
                        StopReason::Panicked(panic_message(e.into_panic()))
                    } else {
                        StopReason::Failed("worker task was cancelled".to_string())
                    };
                    tracing::error!(topic_id = topic_id, reason = %reason, "Worker task ended abnormally");
                    (topic_id, reason)
                }
            };

            active -= 1;
            metrics::set_active_topics(active);
            stops.push((topic_id, reason));
        }

        stops.sort_by_key(|(topic_id, _)| *topic_id);
        tracing::info!(topics = stops.len(), "All workers stopped");
        RunReport { stops }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42u8)), "unknown panic");
    }

    #[test]
    fn test_report_lookup() {
        let report = RunReport {
            stops: vec![
                (1, StopReason::Cancelled),
                (2, StopReason::Failed("bad nonce".into())),
            ],
        };
        assert_eq!(report.reason(1), Some(&StopReason::Cancelled));
        assert_eq!(report.reason(3), None);
        assert_eq!(report.failures().count(), 1);
    }
}
