//! Protobuf messages for transactions and the emissions module.
//!
//! Hand-declared with `prost` derive; field numbers follow the Cosmos SDK
//! `cosmos.tx.v1beta1` schema and Allora's `emissions.v9` messages.

use prost::Message;

pub const PUB_KEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
pub const REGISTER_TYPE_URL: &str = "/emissions.v9.RegisterRequest";
pub const INSERT_WORKER_PAYLOAD_TYPE_URL: &str = "/emissions.v9.InsertWorkerPayloadRequest";

/// `SIGN_MODE_DIRECT` from `cosmos.tx.signing.v1beta1.SignMode`.
pub const SIGN_MODE_DIRECT: i32 = 1;

/// `google.protobuf.Any`.
#[derive(Clone, PartialEq, Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

impl Any {
    /// Pack a message under the given type URL.
    pub fn pack<M: Message>(type_url: &str, message: &M) -> Self {
        Self {
            type_url: type_url.to_string(),
            value: message.encode_to_vec(),
        }
    }
}

#[derive(Clone, PartialEq, Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct PubKey {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxBody {
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<Any>,
    #[prost(string, tag = "2")]
    pub memo: String,
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ModeInfoSingle {
    #[prost(int32, tag = "1")]
    pub mode: i32,
}

/// `ModeInfo` with only the `single` arm of its oneof, which encodes
/// identically to the full message.
#[derive(Clone, PartialEq, Message)]
pub struct ModeInfo {
    #[prost(message, optional, tag = "1")]
    pub single: Option<ModeInfoSingle>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignerInfo {
    #[prost(message, optional, tag = "1")]
    pub public_key: Option<Any>,
    #[prost(message, optional, tag = "2")]
    pub mode_info: Option<ModeInfo>,
    #[prost(uint64, tag = "3")]
    pub sequence: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Fee {
    #[prost(message, repeated, tag = "1")]
    pub amount: Vec<Coin>,
    #[prost(uint64, tag = "2")]
    pub gas_limit: u64,
    #[prost(string, tag = "3")]
    pub payer: String,
    #[prost(string, tag = "4")]
    pub granter: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct AuthInfo {
    #[prost(message, repeated, tag = "1")]
    pub signer_infos: Vec<SignerInfo>,
    #[prost(message, optional, tag = "2")]
    pub fee: Option<Fee>,
}

#[derive(Clone, PartialEq, Message)]
pub struct SignDoc {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(string, tag = "3")]
    pub chain_id: String,
    #[prost(uint64, tag = "4")]
    pub account_number: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

// emissions.v9

#[derive(Clone, PartialEq, Message)]
pub struct RegisterRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(uint64, tag = "2")]
    pub topic_id: u64,
    #[prost(string, tag = "3")]
    pub owner: String,
    #[prost(bool, tag = "4")]
    pub is_reputer: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct Nonce {
    #[prost(int64, tag = "1")]
    pub block_height: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct InputInference {
    #[prost(uint64, tag = "1")]
    pub topic_id: u64,
    #[prost(int64, tag = "2")]
    pub block_height: i64,
    #[prost(string, tag = "3")]
    pub inferer: String,
    #[prost(string, tag = "4")]
    pub value: String,
    #[prost(bytes = "vec", tag = "5")]
    pub extra_data: Vec<u8>,
    #[prost(string, tag = "6")]
    pub proof: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ForecastElement {
    #[prost(string, tag = "1")]
    pub inferer: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InputForecast {
    #[prost(uint64, tag = "1")]
    pub topic_id: u64,
    #[prost(int64, tag = "2")]
    pub block_height: i64,
    #[prost(string, tag = "3")]
    pub forecaster: String,
    #[prost(message, repeated, tag = "4")]
    pub forecast_elements: Vec<ForecastElement>,
    #[prost(bytes = "vec", tag = "5")]
    pub extra_data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InputInferenceForecastBundle {
    #[prost(message, optional, tag = "1")]
    pub inference: Option<InputInference>,
    #[prost(message, optional, tag = "2")]
    pub forecast: Option<InputForecast>,
}

#[derive(Clone, PartialEq, Message)]
pub struct InputWorkerDataBundle {
    #[prost(string, tag = "1")]
    pub worker: String,
    #[prost(message, optional, tag = "2")]
    pub nonce: Option<Nonce>,
    #[prost(uint64, tag = "3")]
    pub topic_id: u64,
    #[prost(message, optional, tag = "4")]
    pub inference_forecasts_bundle: Option<InputInferenceForecastBundle>,
    #[prost(bytes = "vec", tag = "5")]
    pub inferences_forecasts_bundle_signature: Vec<u8>,
    #[prost(string, tag = "6")]
    pub pubkey: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InsertWorkerPayloadRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(message, optional, tag = "2")]
    pub worker_data_bundle: Option<InputWorkerDataBundle>,
}

/// Sequence carried by the first signer of an encoded `TxRaw`.
pub fn signer_sequence(tx_bytes: &[u8]) -> Result<u64, prost::DecodeError> {
    let raw = TxRaw::decode(tx_bytes)?;
    let auth = AuthInfo::decode(raw.auth_info_bytes.as_slice())?;
    Ok(auth.signer_infos.first().map(|s| s.sequence).unwrap_or_default())
}
