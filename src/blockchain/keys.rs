//! Key material derived from a BIP-39 seed phrase.
//!
//! # Security
//! - The seed phrase and private key are never logged or serialized
//! - `Debug` shows the address only

use bitcoin::bech32::{self, Bech32, Hrp};
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::hashes::{ripemd160, sha256, Hash};
use bitcoin::secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey, SignOnly};
use bitcoin::NetworkKind;
use thiserror::Error;

/// Cosmos HD path (coin type 118), first account.
pub const COSMOS_HD_PATH: &str = "m/44'/118'/0'/0/0";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid seed phrase: {0}")]
    Mnemonic(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("invalid address prefix '{0}'")]
    Prefix(String),
}

/// secp256k1 key pair plus the bech32 address it controls.
#[derive(Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: [u8; 33],
    address: String,
    secp: Secp256k1<SignOnly>,
}

impl KeyPair {
    /// Derive the account key at [`COSMOS_HD_PATH`] from a mnemonic.
    pub fn from_mnemonic(phrase: &str, address_prefix: &str) -> Result<Self, KeyError> {
        let mnemonic = bip39::Mnemonic::parse(phrase.trim())
            .map_err(|e| KeyError::Mnemonic(e.to_string()))?;
        let seed = mnemonic.to_seed("");

        let path: DerivationPath = COSMOS_HD_PATH
            .parse()
            .map_err(|e: bitcoin::bip32::Error| KeyError::Derivation(e.to_string()))?;

        let secp = Secp256k1::new();
        let master = Xpriv::new_master(NetworkKind::Main, &seed)
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        let child = master
            .derive_priv(&secp, &path)
            .map_err(|e| KeyError::Derivation(e.to_string()))?;

        Self::from_secret(child.private_key, address_prefix)
    }

    /// Build from a raw secret key.
    pub fn from_secret(secret: SecretKey, address_prefix: &str) -> Result<Self, KeyError> {
        let secp = Secp256k1::signing_only();
        let public = PublicKey::from_secret_key(&secp, &secret).serialize();
        let address = encode_address(address_prefix, &public)?;

        Ok(Self {
            secret,
            public,
            address,
            secp,
        })
    }

    /// Bech32 account address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Compressed SEC1 public key.
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public
    }

    /// ECDSA over SHA-256(`bytes`) with an RFC 6979 nonce, low-S, compact
    /// 64-byte `r || s`. The same input always yields the same signature.
    pub fn sign(&self, bytes: &[u8]) -> [u8; 64] {
        let digest = sha256::Hash::hash(bytes).to_byte_array();
        let message = Message::from_digest(digest);
        let mut signature: Signature = self.secp.sign_ecdsa(&message, &self.secret);
        signature.normalize_s();
        signature.serialize_compact()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// bech32(prefix, RIPEMD160(SHA256(pubkey))).
pub fn encode_address(prefix: &str, public_key: &[u8]) -> Result<String, KeyError> {
    let hrp = Hrp::parse(prefix).map_err(|_| KeyError::Prefix(prefix.to_string()))?;
    let sha = sha256::Hash::hash(public_key);
    let account_id = ripemd160::Hash::hash(sha.as_byte_array());
    bech32::encode::<Bech32>(hrp, account_id.as_byte_array())
        .map_err(|_| KeyError::Prefix(prefix.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::ecdsa::Signature;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_address_shape() {
        let keys = KeyPair::from_mnemonic(TEST_MNEMONIC, "allo").unwrap();
        assert!(keys.address().starts_with("allo1"));
        // hrp + '1' + 32 data chars (20 bytes) + 6 checksum chars
        assert_eq!(keys.address().len(), "allo1".len() + 32 + 6);
        assert!(matches!(keys.public_key()[0], 0x02 | 0x03));
    }

    #[test]
    fn test_derivation_is_stable() {
        let a = KeyPair::from_mnemonic(TEST_MNEMONIC, "allo").unwrap();
        let b = KeyPair::from_mnemonic(&format!("  {TEST_MNEMONIC}\n"), "allo").unwrap();
        assert_eq!(a.address(), b.address());
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_prefix_only_changes_hrp() {
        let allo = KeyPair::from_mnemonic(TEST_MNEMONIC, "allo").unwrap();
        let cosmos = KeyPair::from_mnemonic(TEST_MNEMONIC, "cosmos").unwrap();
        assert!(cosmos.address().starts_with("cosmos1"));
        assert_eq!(allo.public_key(), cosmos.public_key());
    }

    #[test]
    fn test_invalid_mnemonic() {
        let result = KeyPair::from_mnemonic("definitely not a mnemonic", "allo");
        assert!(matches!(result, Err(KeyError::Mnemonic(_))));
    }

    #[test]
    fn test_signature_is_deterministic_and_verifies() {
        let keys = KeyPair::from_mnemonic(TEST_MNEMONIC, "allo").unwrap();
        let sig1 = keys.sign(b"sign doc bytes");
        let sig2 = keys.sign(b"sign doc bytes");
        assert_eq!(sig1, sig2);
        assert_ne!(sig1, keys.sign(b"other bytes"));

        let secp = Secp256k1::verification_only();
        let digest = sha256::Hash::hash(b"sign doc bytes").to_byte_array();
        let signature = Signature::from_compact(&sig1).unwrap();
        let public = PublicKey::from_slice(keys.public_key()).unwrap();
        assert!(secp
            .verify_ecdsa(&Message::from_digest(digest), &signature, &public)
            .is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let keys = KeyPair::from_mnemonic(TEST_MNEMONIC, "allo").unwrap();
        let printed = format!("{keys:?}");
        assert!(printed.contains(keys.address()));
        assert!(!printed.contains("secret"));
    }
}
