//! # Contract ABI call codec
//!
//! Encodes call payloads and decodes return data for contract functions
//! that are described by hand rather than by a generated binding.
//!
//! ## Wire format
//!
//! ```text
//! call payload = selector (4 bytes) ‖ head words ‖ dynamic tails
//!
//! selector     = keccak256("name(type1,type2,...)")[0..4]
//! static value = one 32-byte word, left-padded (uint/address/bool)
//! dynamic head = 32-byte offset, measured from the start of the
//!                enclosing parameter block, pointing at the tail
//! string tail  = length word ‖ utf-8 bytes right-padded to 32
//! tuple        = nested parameter block, inlined when fully static,
//!                otherwise reached through an offset like a string
//! ```
//!
//! The layout is fixed by the contract runtime. Payloads must be
//! byte-identical to what any other conforming encoder produces.
//!
//! ## Integer width
//!
//! `uint256` values are carried as `u128`. Decoding a word whose upper
//! 16 bytes are non-zero fails with [`AbiError::Decode`].

use std::fmt;
use thiserror::Error;

use crate::crypto::keccak256;
use crate::types::Address;

/// Size of one ABI word.
pub const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

// ════════════════════════════════════════════════════════════════════════════
// TYPES & VALUES
// ════════════════════════════════════════════════════════════════════════════

/// Parameter type. Only the shapes the token contract uses are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiType {
    Address,
    Uint256,
    Uint8,
    Bool,
    String,
    Tuple(&'static [AbiType]),
}

impl AbiType {
    /// Canonical name used in function signatures.
    pub fn canonical(&self) -> String {
        match self {
            AbiType::Address => "address".to_string(),
            AbiType::Uint256 => "uint256".to_string(),
            AbiType::Uint8 => "uint8".to_string(),
            AbiType::Bool => "bool".to_string(),
            AbiType::String => "string".to_string(),
            AbiType::Tuple(members) => {
                let inner: Vec<String> = members.iter().map(|t| t.canonical()).collect();
                format!("({})", inner.join(","))
            }
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::String => true,
            AbiType::Tuple(members) => members.iter().any(|t| t.is_dynamic()),
            _ => false,
        }
    }

    /// Bytes this type occupies in the head of its enclosing block.
    fn head_size(&self) -> usize {
        match self {
            AbiType::Tuple(members) if !self.is_dynamic() => {
                members.iter().map(|t| t.head_size()).sum()
            }
            _ => WORD,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Concrete parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Address(Address),
    Uint(u128),
    Bool(bool),
    String(String),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u128> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn into_tuple(self) -> Option<Vec<AbiValue>> {
        match self {
            AbiValue::Tuple(v) => Some(v),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Uint(_) => "uint",
            AbiValue::Bool(_) => "bool",
            AbiValue::String(_) => "string",
            AbiValue::Tuple(_) => "tuple",
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// FUNCTION DESCRIPTOR
// ════════════════════════════════════════════════════════════════════════════

/// A contract function: name, ordered inputs, ordered outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub inputs: &'static [AbiType],
    pub outputs: &'static [AbiType],
}

impl FunctionDescriptor {
    pub const fn new(
        name: &'static str,
        inputs: &'static [AbiType],
        outputs: &'static [AbiType],
    ) -> Self {
        Self { name, inputs, outputs }
    }

    /// `name(type1,type2,...)`
    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(|t| t.canonical()).collect();
        format!("{}({})", self.name, inputs.join(","))
    }

    pub fn selector(&self) -> [u8; 4] {
        let hash = keccak256(self.signature().as_bytes());
        [hash[0], hash[1], hash[2], hash[3]]
    }

    /// Builds the call payload: selector followed by the encoded arguments.
    pub fn encode_call(&self, args: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
        let params = encode_params(self.inputs, args)
            .map_err(|e| AbiError::Encode(format!("{}: {}", self.name, strip_kind(&e))))?;
        let mut out = Vec::with_capacity(4 + params.len());
        out.extend_from_slice(&self.selector());
        out.extend_from_slice(&params);
        Ok(out)
    }

    /// Decodes return data against the declared outputs.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
        decode_params(self.outputs, data)
            .map_err(|e| AbiError::Decode(format!("{}: {}", self.name, strip_kind(&e))))
    }
}

fn strip_kind(e: &AbiError) -> &str {
    match e {
        AbiError::Encode(m) | AbiError::Decode(m) => m,
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ENCODING
// ════════════════════════════════════════════════════════════════════════════

/// Encodes a parameter block (head words followed by dynamic tails).
pub fn encode_params(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, AbiError> {
    if types.len() != values.len() {
        return Err(AbiError::Encode(format!(
            "expected {} arguments, got {}",
            types.len(),
            values.len()
        )));
    }

    let head_len: usize = types.iter().map(|t| t.head_size()).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        let encoded = encode_value(ty, value)?;
        if ty.is_dynamic() {
            head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
            tail.extend_from_slice(&encoded);
        } else {
            head.extend_from_slice(&encoded);
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_value(ty: &AbiType, value: &AbiValue) -> Result<Vec<u8>, AbiError> {
    match (ty, value) {
        (AbiType::Address, AbiValue::Address(a)) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(a.as_bytes());
            Ok(word.to_vec())
        }
        (AbiType::Uint256, AbiValue::Uint(v)) => Ok(uint_word(*v).to_vec()),
        (AbiType::Uint8, AbiValue::Uint(v)) => {
            if *v > u128::from(u8::MAX) {
                return Err(AbiError::Encode(format!("value {} does not fit uint8", v)));
            }
            Ok(uint_word(*v).to_vec())
        }
        (AbiType::Bool, AbiValue::Bool(b)) => Ok(uint_word(u128::from(*b)).to_vec()),
        (AbiType::String, AbiValue::String(s)) => {
            let bytes = s.as_bytes();
            let padded = bytes.len().div_ceil(WORD) * WORD;
            let mut out = Vec::with_capacity(WORD + padded);
            out.extend_from_slice(&uint_word(bytes.len() as u128));
            out.extend_from_slice(bytes);
            out.resize(WORD + padded, 0);
            Ok(out)
        }
        (AbiType::Tuple(members), AbiValue::Tuple(values)) => encode_params(members, values),
        (ty, value) => Err(AbiError::Encode(format!(
            "type mismatch: expected {}, got {} value",
            ty,
            value.kind()
        ))),
    }
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&v.to_be_bytes());
    word
}

// ════════════════════════════════════════════════════════════════════════════
// DECODING
// ════════════════════════════════════════════════════════════════════════════

/// Decodes a parameter block. Values are returned positionally.
///
/// Fails when `data` is shorter than the head of `types`, when an offset
/// or length points outside `data`, or when a word is not a canonical
/// encoding of its declared type.
pub fn decode_params(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, AbiError> {
    let head_len: usize = types.iter().map(|t| t.head_size()).sum();
    if data.len() < head_len {
        return Err(AbiError::Decode(format!(
            "data too short: need at least {} bytes, got {}",
            head_len,
            data.len()
        )));
    }

    let mut values = Vec::with_capacity(types.len());
    let mut pos = 0usize;
    for ty in types {
        let size = ty.head_size();
        let value = if ty.is_dynamic() {
            let offset = read_usize(&data[pos..pos + WORD], "offset")?;
            if offset >= data.len() {
                return Err(AbiError::Decode(format!(
                    "offset {} out of bounds ({} bytes)",
                    offset,
                    data.len()
                )));
            }
            decode_value(ty, &data[offset..])?
        } else {
            decode_value(ty, &data[pos..pos + size])?
        };
        values.push(value);
        pos += size;
    }
    Ok(values)
}

fn decode_value(ty: &AbiType, data: &[u8]) -> Result<AbiValue, AbiError> {
    match ty {
        AbiType::Address => {
            let word = take_word(data)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(AbiError::Decode("address word has dirty upper bytes".to_string()));
            }
            let mut a = [0u8; 20];
            a.copy_from_slice(&word[12..]);
            Ok(AbiValue::Address(Address::from_bytes(a)))
        }
        AbiType::Uint256 => Ok(AbiValue::Uint(read_u128(take_word(data)?)?)),
        AbiType::Uint8 => {
            let v = read_u128(take_word(data)?)?;
            if v > u128::from(u8::MAX) {
                return Err(AbiError::Decode(format!("value {} does not fit uint8", v)));
            }
            Ok(AbiValue::Uint(v))
        }
        AbiType::Bool => match read_u128(take_word(data)?)? {
            0 => Ok(AbiValue::Bool(false)),
            1 => Ok(AbiValue::Bool(true)),
            other => Err(AbiError::Decode(format!("invalid bool word {}", other))),
        },
        AbiType::String => {
            let len = read_usize(take_word(data)?, "string length")?;
            let end = WORD
                .checked_add(len)
                .filter(|end| *end <= data.len())
                .ok_or_else(|| {
                    AbiError::Decode(format!(
                        "string length {} exceeds available {} bytes",
                        len,
                        data.len().saturating_sub(WORD)
                    ))
                })?;
            let s = std::str::from_utf8(&data[WORD..end])
                .map_err(|e| AbiError::Decode(format!("string is not utf-8: {}", e)))?;
            Ok(AbiValue::String(s.to_string()))
        }
        AbiType::Tuple(members) => Ok(AbiValue::Tuple(decode_params(members, data)?)),
    }
}

fn take_word(data: &[u8]) -> Result<&[u8], AbiError> {
    data.get(..WORD)
        .ok_or_else(|| AbiError::Decode(format!("need {} bytes, got {}", WORD, data.len())))
}

fn read_u128(word: &[u8]) -> Result<u128, AbiError> {
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Decode("integer exceeds 128 bits".to_string()));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&word[16..WORD]);
    Ok(u128::from_be_bytes(buf))
}

fn read_usize(word: &[u8], what: &str) -> Result<usize, AbiError> {
    let v = read_u128(word)?;
    usize::try_from(v).map_err(|_| AbiError::Decode(format!("{} {} too large", what, v)))
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const STATIC_PAIR: &[AbiType] = &[AbiType::Uint256, AbiType::Bool];
    const MIXED_RECORD: &[AbiType] = &[AbiType::Address, AbiType::String, AbiType::Uint8, AbiType::String];

    fn arb_type() -> impl Strategy<Value = AbiType> {
        prop_oneof![
            Just(AbiType::Address),
            Just(AbiType::Uint256),
            Just(AbiType::Uint8),
            Just(AbiType::Bool),
            Just(AbiType::String),
            Just(AbiType::Tuple(STATIC_PAIR)),
            Just(AbiType::Tuple(MIXED_RECORD)),
        ]
    }

    fn arb_value(ty: &AbiType) -> BoxedStrategy<AbiValue> {
        match ty {
            AbiType::Address => any::<[u8; 20]>()
                .prop_map(|b| AbiValue::Address(Address::from_bytes(b)))
                .boxed(),
            AbiType::Uint256 => any::<u128>().prop_map(AbiValue::Uint).boxed(),
            AbiType::Uint8 => (0u128..=255).prop_map(AbiValue::Uint).boxed(),
            AbiType::Bool => any::<bool>().prop_map(AbiValue::Bool).boxed(),
            AbiType::String => "\\PC{0,70}".prop_map(AbiValue::String).boxed(),
            AbiType::Tuple(members) => members
                .iter()
                .map(arb_value)
                .collect::<Vec<_>>()
                .prop_map(AbiValue::Tuple)
                .boxed(),
        }
    }

    fn arb_params() -> impl Strategy<Value = (Vec<AbiType>, Vec<AbiValue>)> {
        prop::collection::vec(arb_type(), 0..6).prop_flat_map(|types| {
            let values: Vec<_> = types.iter().map(arb_value).collect();
            (Just(types), values)
        })
    }

    proptest! {
        #[test]
        fn proptest_encode_decode_roundtrip((types, values) in arb_params()) {
            let encoded = encode_params(&types, &values).expect("encode must succeed");
            let decoded = decode_params(&types, &encoded).expect("decode must succeed");
            prop_assert_eq!(values, decoded, "roundtrip must preserve values");
        }

        #[test]
        fn proptest_encode_determinism((types, values) in arb_params()) {
            let encoded1 = encode_params(&types, &values).expect("encode must succeed");
            let encoded2 = encode_params(&types, &values).expect("encode must succeed");
            prop_assert_eq!(encoded1, encoded2, "encode must be deterministic");
        }

        #[test]
        fn proptest_encoded_len_is_word_aligned((types, values) in arb_params()) {
            let encoded = encode_params(&types, &values).expect("encode must succeed");
            prop_assert_eq!(encoded.len() % WORD, 0, "encoding must be whole words");
        }

        // Cutting into the head always fails. Any other prefix either fails
        // or only lost tail padding, in which case the values are intact.
        #[test]
        fn proptest_truncated_decode_is_err(
            (types, values) in arb_params().prop_filter("non-empty", |(t, _)| !t.is_empty()),
            cut_seed in any::<usize>(),
        ) {
            let encoded = encode_params(&types, &values).expect("encode must succeed");
            let head_len: usize = types.iter().map(|t| t.head_size()).sum();
            let cut = cut_seed % encoded.len();
            match decode_params(&types, &encoded[..cut]) {
                Ok(decoded) => {
                    prop_assert!(cut >= head_len, "prefix shorter than head must fail");
                    prop_assert_eq!(decoded, values, "padding-only cut must keep values");
                }
                Err(e) => prop_assert!(matches!(e, AbiError::Decode(_)), "wrong error kind"),
            }
        }

        #[test]
        fn proptest_decode_arbitrary_bytes_never_panics(
            types in prop::collection::vec(arb_type(), 0..6),
            data in prop::collection::vec(any::<u8>(), 0..400),
        ) {
            let _ = decode_params(&types, &data);
        }
    }
}
