//! Transaction construction, fee computation and signing.
//!
//! # Lifecycle
//! ```text
//! TxBuilder::build ─▶ Transaction<Draft> ──with_fee──▶ Transaction<FeeSet> ──sign──▶ SignedTx
//!                          │
//!                          └─ simulation_bytes() (zero-fee placeholder, signed)
//! ```
//! Stages are types: a [`SignedTx`] exposes no way to change body or fee,
//! and a fee can only be attached once to a draft.

use prost::Message;
use std::marker::PhantomData;

use crate::blockchain::keys::KeyPair;
use crate::blockchain::proto::{
    Any, AuthInfo, Coin, Fee, ModeInfo, ModeInfoSingle, PubKey, SignDoc, SignerInfo, TxBody,
    TxRaw, PUB_KEY_TYPE_URL, SIGN_MODE_DIRECT,
};

/// Body and signer metadata set, fee not yet known.
#[derive(Debug)]
pub struct Draft;

/// Gas limit and fee amount attached.
#[derive(Debug)]
pub struct FeeSet;

/// Gas limit and fee amount derived from a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub gas_limit: u64,
    /// In the smallest unit of the fee denomination.
    pub amount: u128,
}

impl FeeQuote {
    /// `gas_limit = ceil(gas_used × adjustment)`,
    /// `amount = floor(gas_limit × gas_price)`.
    ///
    /// Negative or non-finite inputs clamp to zero.
    pub fn compute(gas_used: u64, gas_price: f64, adjustment: f64) -> Self {
        let gas_limit = (gas_used as f64 * adjustment).ceil();
        let gas_limit = if gas_limit.is_finite() && gas_limit > 0.0 {
            gas_limit as u64
        } else {
            0
        };

        let amount = (gas_limit as f64 * gas_price).floor();
        let amount = if amount.is_finite() && amount > 0.0 {
            amount as u128
        } else {
            0
        };

        Self { gas_limit, amount }
    }
}

/// Signing context: key, chain and account the transaction is bound to.
#[derive(Debug, Clone, Copy)]
pub struct TxBuilder<'a> {
    keys: &'a KeyPair,
    chain_id: &'a str,
    account_number: u64,
    denom: &'a str,
}

impl<'a> TxBuilder<'a> {
    pub fn new(keys: &'a KeyPair, chain_id: &'a str, account_number: u64, denom: &'a str) -> Self {
        Self {
            keys,
            chain_id,
            account_number,
            denom,
        }
    }

    /// Start a transaction carrying one message, signed at `sequence`.
    pub fn build(&self, message: Any, timeout_height: u64, sequence: u64) -> Transaction<'a, Draft> {
        let body = TxBody {
            messages: vec![message],
            memo: String::new(),
            timeout_height,
        };

        let signer = SignerInfo {
            public_key: Some(Any::pack(
                PUB_KEY_TYPE_URL,
                &PubKey {
                    key: self.keys.public_key().to_vec(),
                },
            )),
            mode_info: Some(ModeInfo {
                single: Some(ModeInfoSingle {
                    mode: SIGN_MODE_DIRECT,
                }),
            }),
            sequence,
        };

        let quote = FeeQuote {
            gas_limit: 0,
            amount: 0,
        };
        Transaction {
            body_bytes: body.encode_to_vec(),
            signer,
            fee: self.fee(quote),
            quote,
            context: *self,
            _stage: PhantomData,
        }
    }

    fn fee(&self, quote: FeeQuote) -> Fee {
        Fee {
            amount: vec![Coin {
                denom: self.denom.to_string(),
                amount: quote.amount.to_string(),
            }],
            gas_limit: quote.gas_limit,
            payer: String::new(),
            granter: String::new(),
        }
    }
}

/// A transaction at a given construction stage.
#[derive(Debug)]
pub struct Transaction<'a, S> {
    body_bytes: Vec<u8>,
    signer: SignerInfo,
    fee: Fee,
    /// Numeric source of `fee`.
    quote: FeeQuote,
    context: TxBuilder<'a>,
    _stage: PhantomData<S>,
}

impl<'a, S> Transaction<'a, S> {
    /// Sequence recorded in the signer metadata.
    pub fn sequence(&self) -> u64 {
        self.signer.sequence
    }

    fn encode_signed(&self) -> (Vec<u8>, [u8; 64]) {
        let auth_info_bytes = AuthInfo {
            signer_infos: vec![self.signer.clone()],
            fee: Some(self.fee.clone()),
        }
        .encode_to_vec();

        let sign_doc = SignDoc {
            body_bytes: self.body_bytes.clone(),
            auth_info_bytes: auth_info_bytes.clone(),
            chain_id: self.context.chain_id.to_string(),
            account_number: self.context.account_number,
        };
        let signature = self.context.keys.sign(&sign_doc.encode_to_vec());

        let raw = TxRaw {
            body_bytes: self.body_bytes.clone(),
            auth_info_bytes,
            signatures: vec![signature.to_vec()],
        };
        (raw.encode_to_vec(), signature)
    }
}

impl<'a> Transaction<'a, Draft> {
    /// Signed encoding with a zero fee, for gas simulation only.
    pub fn simulation_bytes(&self) -> Vec<u8> {
        self.encode_signed().0
    }

    /// Attach the fee derived from the simulated gas.
    pub fn with_fee(self, quote: FeeQuote) -> Transaction<'a, FeeSet> {
        let fee = self.context.fee(quote);
        Transaction {
            body_bytes: self.body_bytes,
            signer: self.signer,
            fee,
            quote,
            context: self.context,
            _stage: PhantomData,
        }
    }
}

impl<'a> Transaction<'a, FeeSet> {
    pub fn gas_limit(&self) -> u64 {
        self.quote.gas_limit
    }

    /// Fee amount in the smallest denomination unit.
    pub fn fee_amount(&self) -> u128 {
        self.quote.amount
    }

    /// Sign over (body, auth info, chain id, account number). Terminal.
    pub fn sign(self) -> SignedTx {
        let (tx_bytes, signature) = self.encode_signed();
        SignedTx {
            tx_bytes,
            signature,
            sequence: self.signer.sequence,
            gas_limit: self.quote.gas_limit,
            fee_amount: self.quote.amount,
        }
    }
}

/// Final transport encoding of a signed transaction. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    tx_bytes: Vec<u8>,
    signature: [u8; 64],
    sequence: u64,
    gas_limit: u64,
    fee_amount: u128,
}

impl SignedTx {
    /// Encoded `TxRaw`.
    pub fn bytes(&self) -> &[u8] {
        &self.tx_bytes
    }

    pub fn signature(&self) -> &[u8; 64] {
        &self.signature
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn fee_amount(&self) -> u128 {
        self.fee_amount
    }
}
