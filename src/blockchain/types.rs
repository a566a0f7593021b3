//! Chain-specific types and error definitions.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Connection or request failed before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded its deadline.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Response had an unexpected shape or status.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The queried object does not exist (yet).
    #[error("not found: {0}")]
    NotFound(String),

    /// The chain refused the request with an ABCI/gRPC error code.
    #[error("rejected with code {code}: {message}")]
    Rejected { code: u32, message: String },
}

impl ChainError {
    /// Transport and timeout failures are worth retrying; everything else
    /// means the request itself is wrong or the answer is definitive.
    pub fn is_transient(&self) -> bool {
        matches!(self, ChainError::Transport(_) | ChainError::Timeout(_))
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Account state as reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
    /// Balance in the fee denomination's smallest unit.
    pub balance: u128,
}

/// Synchronous (CheckTx) broadcast result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub tx_hash: String,
    /// Zero when the transaction entered the mempool.
    pub code: u32,
    pub raw_log: String,
}

/// Result of a transaction lookup that found the transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxStatus {
    pub height: u64,
    /// Zero when the transaction executed successfully.
    pub code: u32,
    pub raw_log: String,
}

/// Read/write request-response view of the chain.
///
/// Every method is a single round trip with a request-level timeout.
/// Implementations never retry; callers own retry policy.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Network identifier used in the sign doc.
    async fn chain_id(&self) -> ChainResult<String>;

    /// Price of one gas unit in the fee denomination.
    async fn gas_price(&self) -> ChainResult<f64>;

    /// Height of the latest committed block.
    async fn latest_height(&self) -> ChainResult<u64>;

    /// Node reachable and not catching up.
    async fn is_connected(&self) -> bool;

    /// Account number, sequence and balance for an address.
    async fn account_info(&self, address: &str) -> ChainResult<AccountInfo>;

    /// Gas used by a (zero-fee signed) transaction.
    async fn simulate(&self, tx_bytes: &[u8]) -> ChainResult<u64>;

    /// Submit a signed transaction and wait for CheckTx only.
    async fn broadcast_sync(&self, tx_bytes: &[u8]) -> ChainResult<BroadcastResponse>;

    /// Look a transaction up by hash; `NotFound` until it is in a block.
    async fn poll_tx(&self, tx_hash: &str) -> ChainResult<TxStatus>;

    async fn is_topic_active(&self, topic_id: u64) -> ChainResult<bool>;

    async fn is_topic_whitelist_enabled(&self, topic_id: u64) -> ChainResult<bool>;

    async fn is_whitelisted(&self, topic_id: u64, address: &str) -> ChainResult<bool>;

    async fn is_registered(&self, topic_id: u64, address: &str) -> ChainResult<bool>;

    /// Oldest unfulfilled worker nonce (block height), 0 when none.
    async fn unfulfilled_nonce(&self, topic_id: u64) -> ChainResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ChainError::Transport("reset".into()).is_transient());
        assert!(ChainError::Timeout(15).is_transient());
        assert!(!ChainError::Protocol("missing field".into()).is_transient());
        assert!(!ChainError::Rejected {
            code: 2,
            message: "tx parse error".into()
        }
        .is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ChainError::Timeout(15);
        assert_eq!(err.to_string(), "request timed out after 15 seconds");

        let err = ChainError::Rejected {
            code: 32,
            message: "account sequence mismatch".into(),
        };
        assert!(err.to_string().contains("32"));
    }
}
