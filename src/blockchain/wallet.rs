//! The wallet identity shared by every topic worker.
//!
//! # Concurrency
//! Sequence, balance and gas price live behind one `tokio::sync::Mutex`.
//! [`Identity::submit`] holds it for the entire pipeline, so submissions
//! from different topics are fully serialized and never race on the
//! sequence. Everything else is immutable after [`Identity::connect`].

use prost::Message;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::blockchain::keys::KeyPair;
use crate::blockchain::pipeline::{AccountState, SubmissionOutcome, SubmissionPipeline, SubmissionSettings};
use crate::blockchain::proto::{
    Any, InputInference, InputInferenceForecastBundle, InputWorkerDataBundle,
    InsertWorkerPayloadRequest, Nonce, RegisterRequest, INSERT_WORKER_PAYLOAD_TYPE_URL,
    REGISTER_TYPE_URL,
};
use crate::blockchain::transaction::TxBuilder;
use crate::blockchain::types::{ChainError, ChainQuery};
use crate::observability::metrics;

/// Startup failures of the identity. All of them are fatal.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("cannot fetch {what}: {source}")]
    Chain {
        what: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("account {0} does not exist on chain (is the wallet funded?)")]
    AccountNotFound(String),

    #[error("account {0} has no balance to pay fees")]
    NoFunds(String),
}

/// Application message a worker asks the identity to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxMessage {
    /// Register this wallet as a worker for the topic.
    Register { topic_id: u64 },
    /// Submit an inference value for the topic's nonce (block height).
    Inference {
        topic_id: u64,
        nonce: u64,
        /// Decimal text as produced by the inference source.
        value: String,
    },
}

impl TxMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            TxMessage::Register { .. } => "register",
            TxMessage::Inference { .. } => "inference",
        }
    }

    pub fn topic_id(&self) -> u64 {
        match self {
            TxMessage::Register { topic_id } | TxMessage::Inference { topic_id, .. } => *topic_id,
        }
    }
}

/// Single on-chain identity: keys, account and the serialized submit path.
pub struct Identity {
    keys: KeyPair,
    chain_id: String,
    account_number: u64,
    client: Arc<dyn ChainQuery>,
    settings: SubmissionSettings,
    state: Mutex<AccountState>,
}

impl Identity {
    /// Fetch chain id, gas price and account details, then build the identity.
    pub async fn connect(
        keys: KeyPair,
        client: Arc<dyn ChainQuery>,
        settings: SubmissionSettings,
    ) -> Result<Self, IdentityError> {
        tracing::info!(address = %keys.address(), "Initializing worker wallet");

        let chain_id = client.chain_id().await.map_err(|source| IdentityError::Chain {
            what: "chain id",
            source,
        })?;
        let gas_price = client.gas_price().await.map_err(|source| IdentityError::Chain {
            what: "gas price",
            source,
        })?;
        let account = match client.account_info(keys.address()).await {
            Ok(account) => account,
            Err(ChainError::NotFound(_)) => {
                return Err(IdentityError::AccountNotFound(keys.address().to_string()))
            }
            Err(source) => {
                return Err(IdentityError::Chain {
                    what: "account details",
                    source,
                })
            }
        };
        if account.balance == 0 {
            return Err(IdentityError::NoFunds(keys.address().to_string()));
        }

        tracing::info!(
            chain_id = %chain_id,
            account_number = account.account_number,
            sequence = account.sequence,
            balance = %account.balance,
            denom = %settings.denom,
            "Wallet initialized"
        );
        metrics::record_account(account.sequence, account.balance);

        Ok(Self {
            keys,
            chain_id,
            account_number: account.account_number,
            client,
            settings,
            state: Mutex::new(AccountState {
                sequence: account.sequence,
                balance: account.balance,
                gas_price,
            }),
        })
    }

    pub fn address(&self) -> &str {
        self.keys.address()
    }

    pub fn account_number(&self) -> u64 {
        self.account_number
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Next sequence to be used. Waits for an in-flight submission.
    pub async fn sequence(&self) -> u64 {
        self.state.lock().await.sequence
    }

    /// Cached balance. Waits for an in-flight submission.
    pub async fn balance(&self) -> u128 {
        self.state.lock().await.balance
    }

    /// Register for a topic.
    pub async fn register(&self, topic_id: u64) -> SubmissionOutcome {
        self.submit(TxMessage::Register { topic_id }).await
    }

    /// Submit an inference value for a topic nonce.
    pub async fn submit_inference(&self, topic_id: u64, nonce: u64, value: impl Into<String>) -> SubmissionOutcome {
        self.submit(TxMessage::Inference {
            topic_id,
            nonce,
            value: value.into(),
        })
        .await
    }

    /// Send one message through the full pipeline.
    ///
    /// Holds the identity lock for the whole call; on return the sequence
    /// increment and fee debit have been applied if the pipeline reached
    /// broadcast.
    pub async fn submit(&self, message: TxMessage) -> SubmissionOutcome {
        let mut state = self.state.lock().await;

        let kind = message.kind();
        let topic_id = message.topic_id();
        tracing::info!(kind = kind, topic_id = topic_id, sequence = state.sequence, "Submitting transaction");

        let builder = TxBuilder::new(&self.keys, &self.chain_id, self.account_number, &self.settings.denom);
        let pipeline = SubmissionPipeline::new(self.client.as_ref(), builder, &self.settings);
        let outcome = pipeline.run(self.encode(&message), &mut state).await;

        log_outcome(kind, topic_id, &outcome, &state);
        metrics::record_submission(kind, outcome.label());
        metrics::record_account(state.sequence, state.balance);

        outcome
    }

    fn encode(&self, message: &TxMessage) -> Any {
        let address = self.keys.address().to_string();
        match message {
            TxMessage::Register { topic_id } => Any::pack(
                REGISTER_TYPE_URL,
                &RegisterRequest {
                    sender: address.clone(),
                    topic_id: *topic_id,
                    owner: address,
                    is_reputer: false,
                },
            ),
            TxMessage::Inference {
                topic_id,
                nonce,
                value,
            } => {
                let block_height = i64::try_from(*nonce).unwrap_or(i64::MAX);
                let bundle = InputInferenceForecastBundle {
                    inference: Some(InputInference {
                        topic_id: *topic_id,
                        block_height,
                        inferer: address.clone(),
                        value: value.clone(),
                        extra_data: Vec::new(),
                        proof: String::new(),
                    }),
                    forecast: None,
                };
                let signature = self.keys.sign(&bundle.encode_to_vec());

                Any::pack(
                    INSERT_WORKER_PAYLOAD_TYPE_URL,
                    &InsertWorkerPayloadRequest {
                        sender: address.clone(),
                        worker_data_bundle: Some(InputWorkerDataBundle {
                            worker: address,
                            nonce: Some(Nonce { block_height }),
                            topic_id: *topic_id,
                            inference_forecasts_bundle: Some(bundle),
                            inferences_forecasts_bundle_signature: signature.to_vec(),
                            pubkey: hex::encode(self.keys.public_key()),
                        }),
                    },
                )
            }
        }
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("address", &self.keys.address())
            .field("chain_id", &self.chain_id)
            .field("account_number", &self.account_number)
            .finish_non_exhaustive()
    }
}

fn log_outcome(kind: &str, topic_id: u64, outcome: &SubmissionOutcome, state: &AccountState) {
    match outcome {
        SubmissionOutcome::Confirmed { tx_hash, height } => tracing::info!(
            kind = kind,
            topic_id = topic_id,
            tx_hash = %tx_hash,
            height = height,
            sequence = state.sequence,
            balance = %state.balance,
            "Transaction confirmed"
        ),
        SubmissionOutcome::Rejected {
            tx_hash,
            code,
            raw_log,
            stage,
        } => tracing::error!(
            kind = kind,
            topic_id = topic_id,
            tx_hash = tx_hash.as_deref().unwrap_or("-"),
            code = code,
            stage = ?stage,
            raw_log = %raw_log,
            "Transaction rejected"
        ),
        SubmissionOutcome::TimedOut { tx_hash } => tracing::warn!(
            kind = kind,
            topic_id = topic_id,
            tx_hash = %tx_hash,
            "Transaction not included within the poll budget"
        ),
        SubmissionOutcome::Unaffordable { fee, balance } => tracing::warn!(
            kind = kind,
            topic_id = topic_id,
            fee = %fee,
            balance = %balance,
            "Not enough balance to pay the fee"
        ),
        SubmissionOutcome::Unestimable { attempts, reason } => tracing::warn!(
            kind = kind,
            topic_id = topic_id,
            attempts = attempts,
            reason = %reason,
            "Cannot estimate gas"
        ),
        SubmissionOutcome::Unbroadcastable { attempts, reason } => tracing::error!(
            kind = kind,
            topic_id = topic_id,
            attempts = attempts,
            reason = %reason,
            "Transaction cannot be broadcast"
        ),
    }
}
