//! Startup orchestration.
//!
//! # Order
//! ```text
//! keys → LCD client → node sync check → identity connect → topic workers
//! ```
//! Fail fast: any error here is fatal and no worker is started.

use std::sync::Arc;
use thiserror::Error;

use crate::blockchain::keys::KeyError;
use crate::blockchain::pipeline::SubmissionSettings;
use crate::blockchain::wallet::IdentityError;
use crate::blockchain::{ChainError, ChainQuery, Identity, KeyPair, LcdClient};
use crate::config::WorkerConfig;
use crate::lifecycle::orchestrator::Orchestrator;
use crate::worker::{HttpInferenceSource, InferenceError, InferenceSource};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot derive wallet keys: {0}")]
    Keys(#[from] KeyError),

    #[error("cannot create chain client: {0}")]
    Client(#[from] ChainError),

    #[error("cannot create inference client: {0}")]
    Inference(#[from] InferenceError),

    #[error("API node at {0} is not reachable or still syncing")]
    NodeNotReady(String),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("no topics configured")]
    NoTopics,
}

/// Build the production orchestrator from a validated config.
pub async fn bootstrap(config: &WorkerConfig) -> Result<Orchestrator, StartupError> {
    let keys = KeyPair::from_mnemonic(&config.seed_phrase, &config.chain.address_prefix)?;
    let client: Arc<dyn ChainQuery> = Arc::new(LcdClient::new(&config.chain)?);
    let source: Arc<dyn InferenceSource> = Arc::new(HttpInferenceSource::new()?);

    bootstrap_with(config, keys, client, source).await
}

/// Same as [`bootstrap`] with injected collaborators.
pub async fn bootstrap_with(
    config: &WorkerConfig,
    keys: KeyPair,
    client: Arc<dyn ChainQuery>,
    source: Arc<dyn InferenceSource>,
) -> Result<Orchestrator, StartupError> {
    if !client.is_connected().await {
        return Err(StartupError::NodeNotReady(config.chain.api_url.clone()));
    }
    tracing::info!(api_url = %config.chain.api_url, "API node is reachable and synced");

    let settings = SubmissionSettings::from_config(config);
    let identity = Identity::connect(keys, Arc::clone(&client), settings).await?;

    if config.topics.is_empty() {
        return Err(StartupError::NoTopics);
    }

    Ok(Orchestrator::new(
        Arc::new(identity),
        client,
        source,
        config.topics.clone(),
        config.onboarding.clone(),
    ))
}
