//! Cosmos LCD (REST) client with timeout and error handling.
//!
//! # Responsibilities
//! - Query chain state (node info, height, gas price, accounts, topics)
//! - Simulate, broadcast and look up transactions
//! - Map transport, status and shape problems onto [`ChainError`]
//!
//! Every request carries the configured timeout. No method retries; that is
//! the caller's policy.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::blockchain::types::{
    AccountInfo, BroadcastResponse, ChainError, ChainQuery, ChainResult, TxStatus,
};
use crate::config::ChainConfig;

/// gRPC-gateway status code for "not found".
const GRPC_NOT_FOUND: u32 = 5;

/// LCD client shared by the identity and all workers.
#[derive(Clone)]
pub struct LcdClient {
    http: Client,
    base_url: String,
    denom: String,
    timeout_secs: u64,
}

impl LcdClient {
    /// Create a client for the configured endpoint.
    pub fn new(config: &ChainConfig) -> ChainResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ChainError::Transport(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            denom: config.denom.clone(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ChainResult<T> {
        self.send(self.http.get(self.url(path)), path).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> ChainResult<T> {
        self.send(self.http.post(self.url(path)).json(&body), path).await
    }

    /// Send a request and decode the JSON body.
    ///
    /// Error bodies of the form `{"code": n, "message": ...}` become
    /// `NotFound` (code 5) or `Rejected`; other non-2xx statuses are
    /// protocol errors, except 429/5xx without such a body, which count as
    /// transport failures.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> ChainResult<T> {
        tracing::trace!(path = path, "LCD request");

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if let Ok(error) = serde_json::from_str::<GatewayError>(&text) {
            if let Some(code) = error.code.filter(|c| *c != 0) {
                let message = error.message.unwrap_or_default();
                return Err(if code == GRPC_NOT_FOUND {
                    ChainError::NotFound(message)
                } else {
                    ChainError::Rejected { code, message }
                });
            }
        }

        if !status.is_success() {
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    ChainError::Transport(format!("{path}: HTTP {status}"))
                } else {
                    ChainError::Protocol(format!("{path}: HTTP {status}"))
                },
            );
        }

        serde_json::from_str(&text)
            .map_err(|e| ChainError::Protocol(format!("{path}: unexpected response: {e}")))
    }

    fn transport_error(&self, error: reqwest::Error) -> ChainError {
        if error.is_timeout() {
            ChainError::Timeout(self.timeout_secs)
        } else {
            ChainError::Transport(error.to_string())
        }
    }
}

impl std::fmt::Debug for LcdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcdClient")
            .field("base_url", &self.base_url)
            .field("denom", &self.denom)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, raw: &str) -> ChainResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| ChainError::Protocol(format!("`{field}` is not a number: '{raw}'")))
}

#[derive(Deserialize)]
struct GatewayError {
    code: Option<u32>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct NodeInfoResponse {
    default_node_info: NodeInfo,
}

#[derive(Deserialize)]
struct NodeInfo {
    network: String,
}

#[derive(Deserialize)]
struct GasPriceResponse {
    price: CoinAmount,
}

#[derive(Deserialize)]
struct CoinAmount {
    amount: String,
}

#[derive(Deserialize)]
struct LatestBlockResponse {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    header: BlockHeader,
}

#[derive(Deserialize)]
struct BlockHeader {
    height: String,
}

#[derive(Deserialize)]
struct SyncingResponse {
    syncing: bool,
}

#[derive(Deserialize)]
struct AccountInfoResponse {
    info: Option<AccountFields>,
}

#[derive(Deserialize)]
struct AccountFields {
    account_number: String,
    sequence: String,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: Option<CoinAmount>,
}

#[derive(Deserialize)]
struct SimulateResponse {
    gas_info: GasInfo,
}

#[derive(Deserialize)]
struct GasInfo {
    gas_used: String,
}

#[derive(Deserialize)]
struct TxEnvelope {
    tx_response: TxResponse,
}

#[derive(Deserialize)]
struct TxResponse {
    txhash: String,
    #[serde(default)]
    height: String,
    code: u32,
    #[serde(default)]
    raw_log: String,
}

#[derive(Deserialize)]
struct TopicActiveResponse {
    is_active: bool,
}

#[derive(Deserialize)]
struct WhitelistEnabledResponse {
    is_topic_worker_whitelist_enabled: bool,
}

#[derive(Deserialize)]
struct WhitelistedResponse {
    is_whitelisted_topic_worker: bool,
}

#[derive(Deserialize)]
struct RegisteredResponse {
    is_registered: bool,
}

#[derive(Deserialize)]
struct UnfulfilledNoncesResponse {
    nonces: NonceList,
}

#[derive(Deserialize)]
struct NonceList {
    #[serde(default)]
    nonces: Vec<NonceEntry>,
}

#[derive(Deserialize)]
struct NonceEntry {
    block_height: String,
}

#[async_trait]
impl ChainQuery for LcdClient {
    async fn chain_id(&self) -> ChainResult<String> {
        let response: NodeInfoResponse = self.get("/cosmos/base/tendermint/v1beta1/node_info").await?;
        tracing::debug!(chain_id = %response.default_node_info.network, "Received chain ID");
        Ok(response.default_node_info.network)
    }

    async fn gas_price(&self) -> ChainResult<f64> {
        let path = format!("/feemarket/v1/gas_price/{}", self.denom);
        let response: GasPriceResponse = self.get(&path).await?;
        let price: f64 = parse_number("price.amount", &response.price.amount)?;
        if !price.is_finite() || price < 0.0 {
            return Err(ChainError::Protocol(format!("invalid gas price {price}")));
        }
        Ok(price)
    }

    async fn latest_height(&self) -> ChainResult<u64> {
        let response: LatestBlockResponse =
            self.get("/cosmos/base/tendermint/v1beta1/blocks/latest").await?;
        parse_number("block.header.height", &response.block.header.height)
    }

    async fn is_connected(&self) -> bool {
        match self
            .get::<SyncingResponse>("/cosmos/base/tendermint/v1beta1/syncing")
            .await
        {
            Ok(response) if !response.syncing => true,
            Ok(_) => {
                tracing::error!("Node is not ready: still syncing");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot check node syncing status");
                false
            }
        }
    }

    async fn account_info(&self, address: &str) -> ChainResult<AccountInfo> {
        let response: AccountInfoResponse = self
            .get(&format!("/cosmos/auth/v1beta1/account_info/{address}"))
            .await?;
        let info = response
            .info
            .ok_or_else(|| ChainError::NotFound(format!("account {address}")))?;

        let balance: BalanceResponse = self
            .get(&format!(
                "/cosmos/bank/v1beta1/balances/{address}/by_denom?denom={}",
                self.denom
            ))
            .await?;
        let balance = match balance.balance {
            Some(coin) => parse_number("balance.amount", &coin.amount)?,
            None => 0,
        };

        Ok(AccountInfo {
            account_number: parse_number("info.account_number", &info.account_number)?,
            sequence: parse_number("info.sequence", &info.sequence)?,
            balance,
        })
    }

    async fn simulate(&self, tx_bytes: &[u8]) -> ChainResult<u64> {
        let response: SimulateResponse = self
            .post(
                "/cosmos/tx/v1beta1/simulate",
                json!({ "tx_bytes": STANDARD.encode(tx_bytes) }),
            )
            .await?;
        parse_number("gas_info.gas_used", &response.gas_info.gas_used)
    }

    async fn broadcast_sync(&self, tx_bytes: &[u8]) -> ChainResult<BroadcastResponse> {
        let response: TxEnvelope = self
            .post(
                "/cosmos/tx/v1beta1/txs",
                json!({
                    "tx_bytes": STANDARD.encode(tx_bytes),
                    "mode": "BROADCAST_MODE_SYNC",
                }),
            )
            .await?;
        Ok(BroadcastResponse {
            tx_hash: response.tx_response.txhash,
            code: response.tx_response.code,
            raw_log: response.tx_response.raw_log,
        })
    }

    async fn poll_tx(&self, tx_hash: &str) -> ChainResult<TxStatus> {
        let response: TxEnvelope = self.get(&format!("/cosmos/tx/v1beta1/txs/{tx_hash}")).await?;
        Ok(TxStatus {
            height: parse_number("tx_response.height", &response.tx_response.height)?,
            code: response.tx_response.code,
            raw_log: response.tx_response.raw_log,
        })
    }

    async fn is_topic_active(&self, topic_id: u64) -> ChainResult<bool> {
        let response: TopicActiveResponse = self
            .get(&format!("/emissions/v9/is_topic_active/{topic_id}"))
            .await?;
        Ok(response.is_active)
    }

    async fn is_topic_whitelist_enabled(&self, topic_id: u64) -> ChainResult<bool> {
        let response: WhitelistEnabledResponse = self
            .get(&format!("/emissions/v9/is_topic_worker_whitelist_enabled/{topic_id}"))
            .await?;
        Ok(response.is_topic_worker_whitelist_enabled)
    }

    async fn is_whitelisted(&self, topic_id: u64, address: &str) -> ChainResult<bool> {
        let response: WhitelistedResponse = self
            .get(&format!("/emissions/v9/is_whitelisted_topic_worker/{topic_id}/{address}"))
            .await?;
        Ok(response.is_whitelisted_topic_worker)
    }

    async fn is_registered(&self, topic_id: u64, address: &str) -> ChainResult<bool> {
        let response: RegisteredResponse = self
            .get(&format!("/emissions/v9/worker_registered/{topic_id}/{address}"))
            .await?;
        Ok(response.is_registered)
    }

    async fn unfulfilled_nonce(&self, topic_id: u64) -> ChainResult<u64> {
        let response: UnfulfilledNoncesResponse = self
            .get(&format!("/emissions/v9/unfulfilled_worker_nonces/{topic_id}"))
            .await?;
        match response.nonces.nonces.first() {
            Some(entry) => parse_number("nonces[0].block_height", &entry.block_height),
            None => Ok(0),
        }
    }
}
