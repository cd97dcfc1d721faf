//! # Token Contract Descriptors
//!
//! Hand-written descriptors for every token contract function this client
//! touches, plus the field layouts of the two activity record shapes.
//!
//! ## Activity record shapes
//!
//! ```text
//! getActividad(uint256)  → (uint256 id, address usuario, uint256 pesoKg,
//!                           string tipoMaterial, string evidenciaIPFS,
//!                           uint256 tokensCalculados, uint256 timestamp,
//!                           uint256 aprobaciones, bool ejecutada,
//!                           bool rechazada)
//!
//! actividades(uint256)   → the same ten fields flattened, with
//!                          uint8 aprobaciones, plus address propuestoPor
//! ```
//!
//! The typed accessor returns one tuple; the public-array getter returns
//! its fields as separate values. Field positions for both are bound
//! once, in [`TYPED_LAYOUT`] and [`RAW_LAYOUT`].

use recicla_common::abi::{AbiType, AbiValue, FunctionDescriptor};
use recicla_common::types::{ActivityProposal, Material};
use recicla_common::units::from_base_units;

use AbiType::{Address as A, Bool as B, String as S, Uint256 as U, Uint8 as U8};

// ════════════════════════════════════════════════════════════════════════════
// ACTIVITY WORKFLOW
// ════════════════════════════════════════════════════════════════════════════

pub const PROPOSE_ACTIVITY: FunctionDescriptor =
    FunctionDescriptor::new("proponerActividad", &[A, U, S, S], &[]);

pub const APPROVE_ACTIVITY: FunctionDescriptor =
    FunctionDescriptor::new("aprobarActividad", &[U], &[]);

pub const REJECT_ACTIVITY: FunctionDescriptor =
    FunctionDescriptor::new("rechazarActividad", &[U, S], &[]);

const ACTIVITY_TUPLE: &[AbiType] = &[U, A, U, S, S, U, U, U, B, B];

pub const GET_ACTIVITY: FunctionDescriptor =
    FunctionDescriptor::new("getActividad", &[U], &[AbiType::Tuple(ACTIVITY_TUPLE)]);

pub const ACTIVITY_AT: FunctionDescriptor =
    FunctionDescriptor::new("actividades", &[U], &[U, A, U, S, S, U, U, U8, B, B, A]);

pub const ACTIVITY_COUNTER: FunctionDescriptor =
    FunctionDescriptor::new("actividadCounter", &[], &[U]);

// ════════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ════════════════════════════════════════════════════════════════════════════

pub const BALANCE_OF: FunctionDescriptor = FunctionDescriptor::new("balanceOf", &[A], &[U]);

pub const TOTAL_EARNED: FunctionDescriptor =
    FunctionDescriptor::new("totalTokensEarnedByUser", &[A], &[U]);

pub const TOTAL_SPENT: FunctionDescriptor =
    FunctionDescriptor::new("totalTokensSpentByUser", &[A], &[U]);

pub const IS_WHITELISTED: FunctionDescriptor =
    FunctionDescriptor::new("isWhitelisted", &[A], &[B]);

pub const ADD_TO_WHITELIST: FunctionDescriptor =
    FunctionDescriptor::new("addToWhitelist", &[A, S], &[]);

pub const BURN_FOR_REDEMPTION: FunctionDescriptor =
    FunctionDescriptor::new("burnForRedemption", &[A, U, S], &[]);

// ════════════════════════════════════════════════════════════════════════════
// ACTIVITY LAYOUTS
// ════════════════════════════════════════════════════════════════════════════

/// Positions of the activity fields within a decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityLayout {
    pub id: usize,
    pub user: usize,
    pub weight_kg: usize,
    pub material: usize,
    pub evidence: usize,
    pub reward: usize,
    pub timestamp: usize,
    pub approvals: usize,
    pub executed: usize,
    pub rejected: usize,
    pub proposed_by: Option<usize>,
    /// Minimum number of values a record must carry.
    pub field_count: usize,
}

/// Fields of the tuple returned by `getActividad`.
pub const TYPED_LAYOUT: ActivityLayout = ActivityLayout {
    id: 0,
    user: 1,
    weight_kg: 2,
    material: 3,
    evidence: 4,
    reward: 5,
    timestamp: 6,
    approvals: 7,
    executed: 8,
    rejected: 9,
    proposed_by: None,
    field_count: 10,
};

/// Values returned by the `actividades` array getter.
pub const RAW_LAYOUT: ActivityLayout = ActivityLayout {
    proposed_by: Some(10),
    field_count: 11,
    ..TYPED_LAYOUT
};

/// Why a decoded record could not become an [`ActivityProposal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// Fewer values than the layout needs; the contract had no record.
    Incomplete { found: usize, expected: usize },
    /// A value had the wrong shape or was out of range.
    Field(&'static str),
    /// Both terminal flags set.
    BothTerminal,
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete { found, expected } => {
                write!(f, "record has {} fields, expected {}", found, expected)
            }
            Self::Field(name) => write!(f, "field '{}' malformed", name),
            Self::BothTerminal => write!(f, "record is both executed and rejected"),
        }
    }
}

impl ActivityLayout {
    /// Maps decoded values onto a proposal. The id is the one the caller
    /// asked for; the record's own id field is not trusted over it.
    pub fn to_proposal(&self, id: u64, values: &[AbiValue]) -> Result<ActivityProposal, LayoutError> {
        if values.len() < self.field_count {
            return Err(LayoutError::Incomplete {
                found: values.len(),
                expected: self.field_count,
            });
        }

        let uint = |idx: usize, name: &'static str| {
            values[idx].as_uint().ok_or(LayoutError::Field(name))
        };
        let flag = |idx: usize, name: &'static str| {
            values[idx].as_bool().ok_or(LayoutError::Field(name))
        };

        let user_wallet = values[self.user].as_address().ok_or(LayoutError::Field("usuario"))?;
        let weight_kg = u64::try_from(uint(self.weight_kg, "pesoKg")?)
            .map_err(|_| LayoutError::Field("pesoKg"))?;
        let material_raw = values[self.material]
            .as_str()
            .ok_or(LayoutError::Field("tipoMaterial"))?
            .to_string();
        let material = material_raw.parse::<Material>().ok();
        let evidence_ref = values[self.evidence]
            .as_str()
            .ok_or(LayoutError::Field("evidenciaIPFS"))?
            .to_string();
        let reward = from_base_units(uint(self.reward, "tokensCalculados")?);
        let submitted_at = u64::try_from(uint(self.timestamp, "timestamp")?).ok();
        let approvals = u8::try_from(uint(self.approvals, "aprobaciones")?)
            .map_err(|_| LayoutError::Field("aprobaciones"))?;
        let executed = flag(self.executed, "ejecutada")?;
        let rejected = flag(self.rejected, "rechazada")?;
        if executed && rejected {
            return Err(LayoutError::BothTerminal);
        }
        let proposed_by = match self.proposed_by {
            Some(idx) => Some(values[idx].as_address().ok_or(LayoutError::Field("propuestoPor"))?),
            None => None,
        };

        Ok(ActivityProposal {
            id,
            user_wallet,
            weight_kg,
            material_raw,
            material,
            evidence_ref,
            reward,
            approvals,
            executed,
            rejected,
            submitted_at,
            proposed_by,
            transaction_hash: None,
            block_number: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recicla_common::types::Address;
    use recicla_common::units::SCALE;

    fn raw_values(executed: bool, rejected: bool) -> Vec<AbiValue> {
        vec![
            AbiValue::Uint(3),
            AbiValue::Address(Address::from_bytes([0xAA; 20])),
            AbiValue::Uint(10),
            AbiValue::String("plastico".into()),
            AbiValue::String("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG".into()),
            AbiValue::Uint(5 * SCALE),
            AbiValue::Uint(1_700_000_000),
            AbiValue::Uint(1),
            AbiValue::Bool(executed),
            AbiValue::Bool(rejected),
            AbiValue::Address(Address::from_bytes([0xBB; 20])),
        ]
    }

    #[test]
    fn signatures() {
        assert_eq!(PROPOSE_ACTIVITY.signature(), "proponerActividad(address,uint256,string,string)");
        assert_eq!(REJECT_ACTIVITY.signature(), "rechazarActividad(uint256,string)");
        assert_eq!(ACTIVITY_COUNTER.signature(), "actividadCounter()");
        assert_eq!(ADD_TO_WHITELIST.signature(), "addToWhitelist(address,string)");
        assert_eq!(BURN_FOR_REDEMPTION.signature(), "burnForRedemption(address,uint256,string)");
        assert_eq!(hex::encode(BALANCE_OF.selector()), "70a08231");
    }

    #[test]
    fn layouts_match_descriptor_arity() {
        assert_eq!(ACTIVITY_AT.outputs.len(), RAW_LAYOUT.field_count);
        assert_eq!(ACTIVITY_TUPLE.len(), TYPED_LAYOUT.field_count);
        assert_eq!(ACTIVITY_AT.outputs[RAW_LAYOUT.approvals], AbiType::Uint8);
        assert_eq!(ACTIVITY_TUPLE[TYPED_LAYOUT.approvals], AbiType::Uint256);
    }

    #[test]
    fn raw_layout_maps_fields() {
        let p = RAW_LAYOUT.to_proposal(3, &raw_values(false, false)).unwrap();
        assert_eq!(p.id, 3);
        assert_eq!(p.weight_kg, 10);
        assert_eq!(p.material, Some(Material::Plastic));
        assert_eq!(p.material_raw, "plastico");
        assert_eq!(p.reward.to_string(), "5");
        assert_eq!(p.approvals, 1);
        assert_eq!(p.submitted_at, Some(1_700_000_000));
        assert_eq!(p.proposed_by, Some(Address::from_bytes([0xBB; 20])));
        assert!(p.is_pending());
    }

    #[test]
    fn typed_layout_ignores_trailing_proposer() {
        let p = TYPED_LAYOUT.to_proposal(3, &raw_values(true, false)).unwrap();
        assert!(p.proposed_by.is_none());
        assert!(p.executed);
    }

    #[test]
    fn unknown_material_is_kept_verbatim() {
        let mut v = raw_values(false, false);
        v[RAW_LAYOUT.material] = AbiValue::String("textil".into());
        let p = RAW_LAYOUT.to_proposal(4, &v).unwrap();
        assert_eq!(p.material_raw, "textil");
        assert_eq!(p.material, None);

        v[RAW_LAYOUT.material] = AbiValue::String("Papel".into());
        let p = RAW_LAYOUT.to_proposal(4, &v).unwrap();
        assert_eq!(p.material_raw, "Papel");
        assert_eq!(p.material, Some(Material::Paper));
    }

    #[test]
    fn short_record_is_incomplete() {
        let mut v = raw_values(false, false);
        v.truncate(10);
        assert_eq!(
            RAW_LAYOUT.to_proposal(0, &v),
            Err(LayoutError::Incomplete { found: 10, expected: 11 })
        );
        assert!(matches!(
            TYPED_LAYOUT.to_proposal(0, &[]),
            Err(LayoutError::Incomplete { .. })
        ));
    }

    #[test]
    fn both_terminal_flags_rejected() {
        assert_eq!(
            RAW_LAYOUT.to_proposal(0, &raw_values(true, true)),
            Err(LayoutError::BothTerminal)
        );
    }

    #[test]
    fn wrong_shape_rejected() {
        let mut v = raw_values(false, false);
        v[RAW_LAYOUT.executed] = AbiValue::Uint(1);
        assert_eq!(RAW_LAYOUT.to_proposal(0, &v), Err(LayoutError::Field("ejecutada")));
    }
}
