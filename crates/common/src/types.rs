//! Domain types shared by the chain client and its callers.
//!
//! Everything here is a projection of state owned by the token contract.
//! Nothing in this module is authoritative; values are rebuilt from chain
//! reads on every query.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use hex::{encode as hex_encode, decode as hex_decode};
use thiserror::Error;

use crate::units::TokenAmount;

/// Parse failures for the primitive chain types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction hash: {0}")]
    InvalidTxHash(String),

    #[error("unknown material type: {0}")]
    UnknownMaterial(String),
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], String> {
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    if s.len() != N * 2 {
        return Err(format!("expected {} hex chars, got {}", N * 2, s.len()));
    }
    let bytes = hex_decode(s).map_err(|e| e.to_string())?;
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

// ════════════════════════════════════════════════════════════════════════════
// ADDRESS
// ════════════════════════════════════════════════════════════════════════════

/// 20-byte account address, rendered as `0x` + 40 lowercase hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    pub fn from_bytes(b: [u8; 20]) -> Self { Address(b) }
    pub fn as_bytes(&self) -> &[u8; 20] { &self.0 }
    pub fn to_hex(&self) -> String { format!("0x{}", hex_encode(self.0)) }
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_fixed::<20>(s)
            .map(Address)
            .map_err(|e| TypeError::InvalidAddress(format!("'{}': {}", s, e)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Address").field(&self.to_hex()).finish()
    }
}
impl FromStr for Address {
    type Err = TypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Address, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TRANSACTION HASH
// ════════════════════════════════════════════════════════════════════════════

/// 32-byte transaction identifier, rendered as `0x` + 64 hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn from_bytes(b: [u8; 32]) -> Self { TxHash(b) }
    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }
    pub fn to_hex(&self) -> String { format!("0x{}", hex_encode(self.0)) }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TxHash").field(&self.to_hex()).finish()
    }
}
impl FromStr for TxHash {
    type Err = TypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s)
            .map(TxHash)
            .map_err(|e| TypeError::InvalidTxHash(format!("'{}': {}", s, e)))
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_hex())
    }
}
impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<TxHash, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        TxHash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MATERIAL
// ════════════════════════════════════════════════════════════════════════════

/// Recyclable material category.
///
/// The contract stores the category as a lowercase Spanish token; that
/// token is what goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Material {
    #[serde(rename = "plastico")]
    Plastic,
    #[serde(rename = "papel")]
    Paper,
    #[serde(rename = "vidrio")]
    Glass,
    #[serde(rename = "metal")]
    Metal,
    #[serde(rename = "carton")]
    Cardboard,
    #[serde(rename = "organico")]
    Organic,
}

impl Material {
    pub const ALL: [Material; 6] = [
        Material::Plastic,
        Material::Paper,
        Material::Glass,
        Material::Metal,
        Material::Cardboard,
        Material::Organic,
    ];

    /// Token stored by the contract.
    pub fn as_contract_str(&self) -> &'static str {
        match self {
            Material::Plastic => "plastico",
            Material::Paper => "papel",
            Material::Glass => "vidrio",
            Material::Metal => "metal",
            Material::Cardboard => "carton",
            Material::Organic => "organico",
        }
    }

    /// Maps a free-form waste name (as kept in the application catalogue)
    /// to a category. Unrecognised names fall back to plastic.
    pub fn from_waste_name(name: &str) -> Material {
        let n = name.to_lowercase();
        if n.contains("plastico") || n.contains("plástico") {
            Material::Plastic
        } else if n.contains("papel") {
            Material::Paper
        } else if n.contains("vidrio") {
            Material::Glass
        } else if n.contains("metal") || n.contains("aluminio") {
            Material::Metal
        } else if n.contains("carton") || n.contains("cartón") {
            Material::Cardboard
        } else if n.contains("organico") || n.contains("orgánico") {
            Material::Organic
        } else {
            Material::Plastic
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_contract_str())
    }
}

impl FromStr for Material {
    type Err = TypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plastico" | "plastic" => Ok(Material::Plastic),
            "papel" | "paper" => Ok(Material::Paper),
            "vidrio" | "glass" => Ok(Material::Glass),
            "metal" => Ok(Material::Metal),
            "carton" | "cardboard" => Ok(Material::Cardboard),
            "organico" | "organic" => Ok(Material::Organic),
            _ => Err(TypeError::UnknownMaterial(s.to_string())),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ACTIVITY PROPOSAL
// ════════════════════════════════════════════════════════════════════════════

/// Lifecycle state of a proposal. `Executed` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityState {
    Pending,
    Executed,
    Rejected,
}

/// One recycling claim as seen on chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityProposal {
    /// Contract-assigned id, monotonically increasing from 0.
    pub id: u64,
    /// Wallet of the recycler the activity is credited to.
    pub user_wallet: Address,
    pub weight_kg: u64,
    /// Material token exactly as stored by the contract.
    pub material_raw: String,
    /// `None` when the stored token is not a known category.
    pub material: Option<Material>,
    /// Opaque content identifier of the uploaded evidence.
    pub evidence_ref: String,
    /// Reward computed by the contract.
    pub reward: TokenAmount,
    pub approvals: u8,
    pub executed: bool,
    pub rejected: bool,
    /// Contract timestamp (seconds) of the proposal.
    pub submitted_at: Option<u64>,
    /// Proposing account. Only exposed by the raw struct getter.
    pub proposed_by: Option<Address>,
    pub transaction_hash: Option<TxHash>,
    pub block_number: Option<u64>,
}

impl ActivityProposal {
    pub fn state(&self) -> ActivityState {
        if self.executed {
            ActivityState::Executed
        } else if self.rejected {
            ActivityState::Rejected
        } else {
            ActivityState::Pending
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == ActivityState::Pending
    }
}

/// Point-in-time token position of one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub current_balance: TokenAmount,
    pub total_earned: TokenAmount,
    pub total_spent: TokenAmount,
    pub is_whitelisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_hex_roundtrip_is_lowercase() {
        let a = Address::from_hex("0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap();
        assert_eq!(a.to_hex(), "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266");
        let b: Address = "f39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn address_rejects_bad_length() {
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("0xzz39fd6e51aad88f6f4ce6ab8827279cfffb9226").is_err());
    }

    #[test]
    fn address_serde_as_string() {
        let a = Address::from_bytes([0xAA; 20]);
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "aa".repeat(20)));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn tx_hash_parse() {
        let h: TxHash = format!("0x{}", "ab".repeat(32)).parse().unwrap();
        assert_eq!(h.as_bytes(), &[0xAB; 32]);
        assert!("0xabcd".parse::<TxHash>().is_err());
    }

    #[test]
    fn material_accepts_wire_and_english_names() {
        assert_eq!("plastico".parse::<Material>().unwrap(), Material::Plastic);
        assert_eq!("Cardboard".parse::<Material>().unwrap(), Material::Cardboard);
        assert!("steel".parse::<Material>().is_err());
        for m in Material::ALL {
            assert_eq!(m.as_contract_str().parse::<Material>().unwrap(), m);
        }
    }

    #[test]
    fn material_from_waste_name() {
        assert_eq!(Material::from_waste_name("Botellas de Plástico"), Material::Plastic);
        assert_eq!(Material::from_waste_name("Latas de aluminio"), Material::Metal);
        assert_eq!(Material::from_waste_name("Cartón corrugado"), Material::Cardboard);
        assert_eq!(Material::from_waste_name("desconocido"), Material::Plastic);
    }

    #[test]
    fn activity_state_follows_flags() {
        let mut p = ActivityProposal {
            id: 0,
            user_wallet: Address::default(),
            weight_kg: 10,
            material_raw: "plastico".into(),
            material: Some(Material::Plastic),
            evidence_ref: "Qm".into(),
            reward: TokenAmount::ZERO,
            approvals: 0,
            executed: false,
            rejected: false,
            submitted_at: None,
            proposed_by: None,
            transaction_hash: None,
            block_number: None,
        };
        assert_eq!(p.state(), ActivityState::Pending);
        p.rejected = true;
        assert_eq!(p.state(), ActivityState::Rejected);
        assert!(!p.is_pending());
    }
}
