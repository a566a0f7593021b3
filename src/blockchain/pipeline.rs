//! Submission pipeline: simulate → fee → sign → broadcast → confirm.
//!
//! # States
//! ```text
//! Draft ─simulate─▶ Simulated ─▶ FeeSet ─afford?─▶ Signed ─broadcast─▶ Broadcast ─poll─▶ Confirmed
//!   │                              │                 │                   │
//!   └─▶ Unestimable                └─▶ Unaffordable  ├─▶ Unbroadcastable ├─▶ Rejected
//!                                                    └─▶ Rejected        └─▶ TimedOut
//! ```
//! Terminal states before `Broadcast` leave the account untouched. Every
//! terminal state at or after it consumes one sequence slot and debits the
//! fee, exactly once, in [`SubmissionPipeline::run`].

use serde::{Deserialize, Serialize};

use crate::blockchain::proto::Any;
use crate::blockchain::transaction::{FeeQuote, SignedTx, TxBuilder};
use crate::blockchain::types::{ChainError, ChainQuery};
use crate::config::{SubmissionConfig, WorkerConfig};
use crate::resilience::{retry, Attempt, RetryError};

/// Fee and retry settings shared by every submission.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmissionSettings {
    pub policies: SubmissionConfig,
    pub gas_adjustment: f64,
    pub denom: String,
    pub timeout_height_offset: u64,
}

impl SubmissionSettings {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            policies: config.submission.clone(),
            gas_adjustment: config.chain.gas_adjustment,
            denom: config.chain.denom.clone(),
            timeout_height_offset: config.chain.timeout_height_offset,
        }
    }
}

/// Mutable account cache guarded by the identity lock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub sequence: u64,
    pub balance: u128,
    /// Last gas price seen; used when a fresh query fails.
    pub gas_price: f64,
}

/// Where a rejection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionStage {
    /// Refused synchronously by the broadcast call (CheckTx).
    Broadcast,
    /// Included in a block but execution failed.
    Execution,
}

/// Terminal state of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Confirmed {
        tx_hash: String,
        height: u64,
    },
    Rejected {
        tx_hash: Option<String>,
        code: u32,
        raw_log: String,
        stage: RejectionStage,
    },
    /// Broadcast accepted but not seen in a block within the poll budget.
    TimedOut {
        tx_hash: String,
    },
    Unaffordable {
        fee: u128,
        balance: u128,
    },
    Unestimable {
        attempts: u32,
        reason: String,
    },
    Unbroadcastable {
        attempts: u32,
        reason: String,
    },
}

impl SubmissionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed { .. })
    }

    /// Whether the pipeline reached the broadcast stage.
    pub fn reached_broadcast(&self) -> bool {
        !matches!(
            self,
            SubmissionOutcome::Unaffordable { .. } | SubmissionOutcome::Unestimable { .. }
        )
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Confirmed { .. } => "confirmed",
            SubmissionOutcome::Rejected { .. } => "rejected",
            SubmissionOutcome::TimedOut { .. } => "timed_out",
            SubmissionOutcome::Unaffordable { .. } => "unaffordable",
            SubmissionOutcome::Unestimable { .. } => "unestimable",
            SubmissionOutcome::Unbroadcastable { .. } => "unbroadcastable",
        }
    }
}

fn classify(error: ChainError) -> Attempt<ChainError> {
    if error.is_transient() {
        Attempt::Transient(error)
    } else {
        Attempt::Fatal(error)
    }
}

/// One pass of the transaction lifecycle for a single message.
pub struct SubmissionPipeline<'a> {
    client: &'a dyn ChainQuery,
    builder: TxBuilder<'a>,
    settings: &'a SubmissionSettings,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(
        client: &'a dyn ChainQuery,
        builder: TxBuilder<'a>,
        settings: &'a SubmissionSettings,
    ) -> Self {
        Self {
            client,
            builder,
            settings,
        }
    }

    /// Drive `message` to a terminal state and settle `state`.
    ///
    /// The caller must hold the identity lock for the whole call.
    pub async fn run(&self, message: Any, state: &mut AccountState) -> SubmissionOutcome {
        let client = self.client;
        let timeout_height = match retry(&self.settings.policies.simulate, "read latest height", |_| async move {
            client.latest_height().await.map_err(classify)
        })
        .await
        {
            Ok(height) => height + self.settings.timeout_height_offset,
            Err(e) => {
                return SubmissionOutcome::Unestimable {
                    attempts: e.attempts(),
                    reason: format!("cannot read latest height: {}", e.into_inner()),
                }
            }
        };

        let draft = self.builder.build(message, timeout_height, state.sequence);

        // Draft → Simulated
        let simulation = draft.simulation_bytes();
        let simulation = simulation.as_slice();
        let gas_used = match retry(&self.settings.policies.simulate, "estimate gas", |_| async move {
            client.simulate(simulation).await.map_err(classify)
        })
        .await
        {
            Ok(gas) => gas,
            Err(e) => {
                return SubmissionOutcome::Unestimable {
                    attempts: e.attempts(),
                    reason: e.into_inner().to_string(),
                }
            }
        };
        tracing::debug!(gas_used = gas_used, "Gas estimated");

        match self.client.gas_price().await {
            Ok(price) => state.gas_price = price,
            Err(e) => tracing::warn!(
                error = %e,
                gas_price = state.gas_price,
                "Cannot refresh gas price, using last known"
            ),
        }

        // Simulated → FeeSet
        let quote = FeeQuote::compute(gas_used, state.gas_price, self.settings.gas_adjustment);
        let tx = draft.with_fee(quote);
        tracing::debug!(
            gas_limit = tx.gas_limit(),
            fee = %tx.fee_amount(),
            denom = %self.settings.denom,
            "Fee computed"
        );

        if tx.fee_amount() > state.balance {
            return SubmissionOutcome::Unaffordable {
                fee: tx.fee_amount(),
                balance: state.balance,
            };
        }

        // FeeSet → Signed → Broadcast → terminal
        let signed = tx.sign();
        let outcome = self.broadcast_and_confirm(&signed).await;
        self.settle(&signed, &outcome, state);
        outcome
    }

    async fn broadcast_and_confirm(&self, signed: &SignedTx) -> SubmissionOutcome {
        let client = self.client;
        let bytes = signed.bytes();
        let response = match retry(
            &self.settings.policies.broadcast,
            "broadcast transaction",
            |_| async move { client.broadcast_sync(bytes).await.map_err(classify) },
        )
        .await
        {
            Ok(response) => response,
            Err(RetryError::Aborted {
                error: ChainError::Rejected { code, message },
                ..
            }) => {
                return SubmissionOutcome::Rejected {
                    tx_hash: None,
                    code,
                    raw_log: message,
                    stage: RejectionStage::Broadcast,
                }
            }
            Err(e) => {
                return SubmissionOutcome::Unbroadcastable {
                    attempts: e.attempts(),
                    reason: e.into_inner().to_string(),
                }
            }
        };

        if response.code != 0 {
            return SubmissionOutcome::Rejected {
                tx_hash: Some(response.tx_hash),
                code: response.code,
                raw_log: response.raw_log,
                stage: RejectionStage::Broadcast,
            };
        }

        tracing::info!(tx_hash = %response.tx_hash, sequence = signed.sequence(), "Transaction broadcast");
        self.confirm(response.tx_hash).await
    }

    async fn confirm(&self, tx_hash: String) -> SubmissionOutcome {
        let policy = &self.settings.policies.confirm;
        let polls = policy.max_attempts.max(1);

        for poll in 1..=polls {
            match self.client.poll_tx(&tx_hash).await {
                Ok(status) if status.code == 0 => {
                    return SubmissionOutcome::Confirmed {
                        tx_hash,
                        height: status.height,
                    }
                }
                Ok(status) => {
                    return SubmissionOutcome::Rejected {
                        tx_hash: Some(tx_hash),
                        code: status.code,
                        raw_log: status.raw_log,
                        stage: RejectionStage::Execution,
                    }
                }
                Err(ChainError::NotFound(_)) => {
                    tracing::debug!(tx_hash = %tx_hash, poll = poll, "Transaction not in a block yet");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(tx_hash = %tx_hash, error = %e, "Cannot check transaction status");
                }
                Err(e) => {
                    tracing::error!(tx_hash = %tx_hash, error = %e, "Unexpected transaction status response");
                    break;
                }
            }

            if poll < polls {
                tokio::time::sleep(policy.delay_after(poll)).await;
            }
        }

        SubmissionOutcome::TimedOut { tx_hash }
    }

    /// Apply the post-broadcast side effects exactly once.
    fn settle(&self, signed: &SignedTx, outcome: &SubmissionOutcome, state: &mut AccountState) {
        if !outcome.reached_broadcast() {
            return;
        }
        state.sequence += 1;
        state.balance = state.balance.saturating_sub(signed.fee_amount());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_early_exits_skip_broadcast() {
        let early = [
            SubmissionOutcome::Unaffordable { fee: 2, balance: 1 },
            SubmissionOutcome::Unestimable {
                attempts: 3,
                reason: "down".into(),
            },
        ];
        for outcome in early {
            assert!(!outcome.reached_broadcast(), "{outcome:?}");
        }

        let late = [
            SubmissionOutcome::Confirmed {
                tx_hash: "AB".into(),
                height: 10,
            },
            SubmissionOutcome::TimedOut { tx_hash: "AB".into() },
            SubmissionOutcome::Unbroadcastable {
                attempts: 5,
                reason: "reset".into(),
            },
            SubmissionOutcome::Rejected {
                tx_hash: None,
                code: 11,
                raw_log: "out of gas".into(),
                stage: RejectionStage::Execution,
            },
        ];
        for outcome in late {
            assert!(outcome.reached_broadcast(), "{outcome:?}");
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(SubmissionOutcome::TimedOut { tx_hash: String::new() }.label(), "timed_out");
        assert!(SubmissionOutcome::Confirmed {
            tx_hash: String::new(),
            height: 1
        }
        .is_confirmed());
    }
}
