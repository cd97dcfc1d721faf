//! Crypto helpers: keccak-256 hashing and secp256k1 signing credentials.
//!
//! A [`Credential`] wraps one private key and the account address derived
//! from it (last 20 bytes of keccak256 of the uncompressed public key,
//! without the 0x04 prefix). Key material is never printed; `Debug` shows
//! the address only.

use hex::{encode as hex_encode, decode as hex_decode};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::PublicKey;
use sha3::{Digest, Keccak256};
use std::fmt;
use thiserror::Error;

use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The address derived from the key is not the declared wallet.
    #[error("credential mismatch: declared {declared}, key belongs to {derived}")]
    Mismatch { declared: Address, derived: Address },
}

/// keccak-256 digest (32 bytes).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// keccak-256 of a UTF-8 string rendered as `0x`-prefixed hex.
pub fn keccak256_hex_str(s: &str) -> String {
    format!("0x{}", hex_encode(keccak256(s.as_bytes())))
}

/// Derive an account address from a secp256k1 public key.
pub fn address_from_public_key(public: &PublicKey) -> Address {
    let point = public.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut arr = [0u8; 20];
    arr.copy_from_slice(&hash[12..]);
    Address::from_bytes(arr)
}

/// Signing credential: a private key plus its derived address.
///
/// Deliberately not `Clone`: a validator credential is built from the
/// caller's key material for one call and dropped afterwards.
pub struct Credential {
    key: SigningKey,
    address: Address,
}

impl Credential {
    /// Parse a 32-byte private key given as hex (with or without `0x`).
    pub fn from_private_key_hex(hexstr: &str) -> Result<Self, CredentialError> {
        let trimmed = hexstr.trim();
        let s = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex_decode(s).map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(CredentialError::InvalidKey(format!(
                "expected 32 bytes, found {}",
                bytes.len()
            )));
        }
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        let address = address_from_public_key(&PublicKey::from(key.verifying_key()));
        Ok(Self { key, address })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Fails with [`CredentialError::Mismatch`] unless this key controls
    /// `declared`.
    pub fn verify_matches(&self, declared: &Address) -> Result<(), CredentialError> {
        if &self.address != declared {
            return Err(CredentialError::Mismatch {
                declared: *declared,
                derived: self.address,
            });
        }
        Ok(())
    }

    /// Key handle for transaction signers.
    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development accounts.
    const DEV_KEY_0: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDR_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const DEV_KEY_2: &str = "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";
    const DEV_ADDR_2: &str = "0x3C44CdDdB6a900fa2b585dd299e03d12FA4293BC";

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex_encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_keccak_hex_str_prefixed() {
        let h = keccak256_hex_str("12345678");
        assert!(h.starts_with("0x"));
        assert_eq!(h.len(), 66);
    }

    #[test]
    fn test_address_derivation_known_keys() {
        let c0 = Credential::from_private_key_hex(DEV_KEY_0).expect("key 0");
        assert_eq!(c0.address(), Address::from_hex(DEV_ADDR_0).unwrap());
        let c2 = Credential::from_private_key_hex(DEV_KEY_2).expect("key 2");
        assert_eq!(c2.address(), Address::from_hex(DEV_ADDR_2).unwrap());
    }

    #[test]
    fn test_verify_matches() {
        let c0 = Credential::from_private_key_hex(DEV_KEY_0).unwrap();
        assert!(c0.verify_matches(&Address::from_hex(DEV_ADDR_0).unwrap()).is_ok());
        let err = c0
            .verify_matches(&Address::from_hex(DEV_ADDR_2).unwrap())
            .unwrap_err();
        assert!(matches!(err, CredentialError::Mismatch { .. }));
    }

    #[test]
    fn test_invalid_keys_rejected() {
        assert!(Credential::from_private_key_hex("0x1234").is_err());
        assert!(Credential::from_private_key_hex("not-hex").is_err());
        // zero is not a valid scalar
        assert!(Credential::from_private_key_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let c0 = Credential::from_private_key_hex(DEV_KEY_0).unwrap();
        let dbg = format!("{:?}", c0);
        assert!(dbg.contains("redacted"));
        assert!(!dbg.contains("ac0974bec39a17e3"));
    }

    #[test]
    fn test_signing_key_derives_same_address() {
        let c0 = Credential::from_private_key_hex(DEV_KEY_0).unwrap();
        let public = PublicKey::from(c0.signing_key().verifying_key());
        assert_eq!(address_from_public_key(&public), c0.address());
    }
}
