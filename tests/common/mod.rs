//! Shared utilities for integration testing.

#![allow(dead_code)]

use async_trait::async_trait;
use prost::Message;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use inference_worker::blockchain::pipeline::SubmissionSettings;
use inference_worker::blockchain::proto::{self, TxBody, TxRaw};
use inference_worker::blockchain::types::{
    AccountInfo, BroadcastResponse, ChainError, ChainQuery, ChainResult, TxStatus,
};
use inference_worker::blockchain::{Identity, KeyPair};
use inference_worker::config::SubmissionConfig;
use inference_worker::resilience::RetryPolicy;
use inference_worker::worker::{InferenceError, InferenceSource, InferenceValue};

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub fn test_keys() -> KeyPair {
    KeyPair::from_mnemonic(TEST_MNEMONIC, "allo").unwrap()
}

/// Submission settings with millisecond retry delays.
pub fn fast_settings() -> SubmissionSettings {
    SubmissionSettings {
        policies: SubmissionConfig {
            simulate: RetryPolicy::fixed(3, 5),
            broadcast: RetryPolicy::fixed(3, 5),
            confirm: RetryPolicy::fixed(4, 5),
        },
        gas_adjustment: 1.5,
        denom: "uallo".to_string(),
        timeout_height_offset: 50,
    }
}

pub async fn connect_identity(chain: &Arc<MockChain>) -> Arc<Identity> {
    let identity = Identity::connect(test_keys(), chain.clone(), fast_settings())
        .await
        .unwrap();
    chain.clear_events();
    Arc::new(identity)
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Scriptable chain state behind [`MockChain`].
#[derive(Debug)]
pub struct ChainState {
    pub chain_id: String,
    pub gas_price: f64,
    pub height: u64,
    pub connected: bool,
    /// `None` means the account does not exist.
    pub account: Option<AccountInfo>,
    pub gas_used: u64,
    /// Errors returned by the next simulate calls, in order.
    pub simulate_errors: VecDeque<ChainError>,
    /// Errors returned by the next latest-height reads, in order.
    pub height_errors: VecDeque<ChainError>,
    /// Errors returned by the next broadcast calls, in order.
    pub broadcast_errors: VecDeque<ChainError>,
    /// CheckTx code returned by broadcast.
    pub broadcast_code: u32,
    /// DeliverTx code returned once the transaction is found.
    pub tx_code: u32,
    /// Polls answered with NotFound before a transaction is found.
    pub pending_polls: u32,
    pub never_included: bool,
    pub topic_active: bool,
    /// Overrides `topic_active` for the next activity checks, in order.
    pub active_script: VecDeque<ChainResult<bool>>,
    pub whitelist_enabled: bool,
    pub whitelisted: bool,
    pub registered: bool,
    pub nonce: u64,
    pub nonce_errors: VecDeque<ChainError>,
    /// Sequence of every broadcast transaction, in order.
    pub broadcast_sequences: Vec<u64>,
    /// Message type url of every broadcast transaction, in order.
    pub broadcast_kinds: Vec<String>,
    pub polls: HashMap<String, u32>,
}

impl Default for ChainState {
    fn default() -> Self {
        Self {
            chain_id: "allora-testnet-1".to_string(),
            gas_price: 10.0,
            height: 1_000,
            connected: true,
            account: Some(AccountInfo {
                account_number: 42,
                sequence: 5,
                balance: 1_000_000_000,
            }),
            gas_used: 100_000,
            simulate_errors: VecDeque::new(),
            height_errors: VecDeque::new(),
            broadcast_errors: VecDeque::new(),
            broadcast_code: 0,
            tx_code: 0,
            pending_polls: 0,
            never_included: false,
            topic_active: true,
            active_script: VecDeque::new(),
            whitelist_enabled: false,
            whitelisted: false,
            registered: true,
            nonce: 0,
            nonce_errors: VecDeque::new(),
            broadcast_sequences: Vec::new(),
            broadcast_kinds: Vec::new(),
            polls: HashMap::new(),
        }
    }
}

/// In-memory chain implementing [`ChainQuery`].
///
/// Every call is appended to an event log so tests can check ordering and
/// that no call happened after a given point.
#[derive(Debug, Default)]
pub struct MockChain {
    pub state: Mutex<ChainState>,
    events: Mutex<Vec<&'static str>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_state(state: ChainState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            ..Default::default()
        })
    }

    /// Every simulate and broadcast call takes `latency`.
    pub fn with_latency(state: ChainState, latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            latency,
            ..Default::default()
        })
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ChainState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().unwrap().iter().filter(|e| **e == event).count()
    }

    pub fn total_calls(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn broadcast_sequences(&self) -> Vec<u64> {
        self.state.lock().unwrap().broadcast_sequences.clone()
    }

    pub fn broadcast_kinds(&self) -> Vec<String> {
        self.state.lock().unwrap().broadcast_kinds.clone()
    }

    /// Highest number of simulate/broadcast calls seen running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }

    async fn slow_section(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

fn message_type(tx_bytes: &[u8]) -> String {
    TxRaw::decode(tx_bytes)
        .ok()
        .and_then(|raw| TxBody::decode(raw.body_bytes.as_slice()).ok())
        .and_then(|body| body.messages.into_iter().next())
        .map(|any| any.type_url)
        .unwrap_or_default()
}

#[async_trait]
impl ChainQuery for MockChain {
    async fn chain_id(&self) -> ChainResult<String> {
        self.record("chain_id");
        Ok(self.update(|s| s.chain_id.clone()))
    }

    async fn gas_price(&self) -> ChainResult<f64> {
        self.record("gas_price");
        Ok(self.update(|s| s.gas_price))
    }

    async fn latest_height(&self) -> ChainResult<u64> {
        self.record("latest_height");
        self.update(|s| match s.height_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(s.height),
        })
    }

    async fn is_connected(&self) -> bool {
        self.record("is_connected");
        self.update(|s| s.connected)
    }

    async fn account_info(&self, address: &str) -> ChainResult<AccountInfo> {
        self.record("account_info");
        self.update(|s| s.account)
            .ok_or_else(|| ChainError::NotFound(format!("account {address} not found")))
    }

    async fn simulate(&self, _tx_bytes: &[u8]) -> ChainResult<u64> {
        self.record("simulate");
        self.slow_section().await;
        self.update(|s| match s.simulate_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(s.gas_used),
        })
    }

    async fn broadcast_sync(&self, tx_bytes: &[u8]) -> ChainResult<BroadcastResponse> {
        self.record("broadcast");
        self.slow_section().await;
        let sequence = proto::signer_sequence(tx_bytes).unwrap();
        let kind = message_type(tx_bytes);
        self.update(|s| {
            if let Some(e) = s.broadcast_errors.pop_front() {
                return Err(e);
            }
            s.broadcast_sequences.push(sequence);
            s.broadcast_kinds.push(kind.clone());
            if s.broadcast_code == 0 && kind == proto::REGISTER_TYPE_URL {
                s.registered = true;
            }
            Ok(BroadcastResponse {
                tx_hash: format!("HASH{sequence}"),
                code: s.broadcast_code,
                raw_log: if s.broadcast_code == 0 {
                    String::new()
                } else {
                    "check tx failed".to_string()
                },
            })
        })
    }

    async fn poll_tx(&self, tx_hash: &str) -> ChainResult<TxStatus> {
        self.record("poll_tx");
        self.update(|s| {
            let seen = s.polls.entry(tx_hash.to_string()).or_insert(0);
            *seen += 1;
            if s.never_included || *seen <= s.pending_polls {
                return Err(ChainError::NotFound(format!("tx {tx_hash} not found")));
            }
            Ok(TxStatus {
                height: s.height + 1,
                code: s.tx_code,
                raw_log: if s.tx_code == 0 {
                    String::new()
                } else {
                    "execution failed".to_string()
                },
            })
        })
    }

    async fn is_topic_active(&self, _topic_id: u64) -> ChainResult<bool> {
        self.record("is_topic_active");
        self.update(|s| s.active_script.pop_front().unwrap_or(Ok(s.topic_active)))
    }

    async fn is_topic_whitelist_enabled(&self, _topic_id: u64) -> ChainResult<bool> {
        self.record("is_topic_whitelist_enabled");
        Ok(self.update(|s| s.whitelist_enabled))
    }

    async fn is_whitelisted(&self, _topic_id: u64, _address: &str) -> ChainResult<bool> {
        self.record("is_whitelisted");
        Ok(self.update(|s| s.whitelisted))
    }

    async fn is_registered(&self, _topic_id: u64, _address: &str) -> ChainResult<bool> {
        self.record("is_registered");
        Ok(self.update(|s| s.registered))
    }

    async fn unfulfilled_nonce(&self, _topic_id: u64) -> ChainResult<u64> {
        self.record("unfulfilled_nonce");
        self.update(|s| match s.nonce_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(s.nonce),
        })
    }
}

/// Inference source answering from a script, then a fixed value.
#[derive(Debug, Default)]
pub struct MockInference {
    script: Mutex<VecDeque<Result<InferenceValue, InferenceError>>>,
    fallback: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockInference {
    /// Always answers `value`.
    pub fn constant(value: &str) -> Arc<Self> {
        let source = Self::default();
        *source.fallback.lock().unwrap() = Some(value.to_string());
        Arc::new(source)
    }

    /// Always fails.
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, result: Result<InferenceValue, InferenceError>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceSource for MockInference {
    async fn fetch(&self, _url: &str) -> Result<InferenceValue, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(result) = self.script.lock().unwrap().pop_front() {
            return result;
        }
        match self.fallback.lock().unwrap().as_deref() {
            Some(value) => InferenceValue::parse(value),
            None => Err(InferenceError::Status(503)),
        }
    }
}

/// A request seen by the programmable backend.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Start a programmable HTTP backend on an ephemeral port.
///
/// `f` maps each request to `(status, body)`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(SeenRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let Some(request) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, body) = f(request).await;
                        let status_text = match status {
                            200 => "200 OK",
                            400 => "400 Bad Request",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn read_request(socket: &mut TcpStream) -> Option<SeenRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(SeenRequest { method, path, body })
}
