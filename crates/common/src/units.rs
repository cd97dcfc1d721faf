//! Conversion between contract base units and decimal token amounts.
//!
//! The token uses 18 decimals. Base units are held as `u128`, which covers
//! roughly 3.4 * 10^20 whole tokens. Decimal amounts travel as strings so
//! no floating point is involved anywhere on the path.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fractional digits of the token.
pub const DECIMALS: u32 = 18;
/// Base units per whole token.
pub const SCALE: u128 = 10u128.pow(DECIMALS);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
}

/// Scales a decimal amount by 10^18. Digits beyond the 18th fractional
/// place are truncated.
///
/// Accepts `"12"`, `"12.5"`, `".5"`, `"+3"`. Negative, empty or
/// non-numeric input fails with [`UnitError::InvalidAmount`], as does a
/// value that does not fit in 128 bits once scaled.
pub fn to_base_units(amount: &str) -> Result<u128, UnitError> {
    let s = amount.trim();
    if s.is_empty() {
        return Err(UnitError::InvalidAmount("empty amount".to_string()));
    }
    if s.starts_with('-') {
        return Err(UnitError::InvalidAmount(format!("negative amount '{}'", s)));
    }
    let s = s.strip_prefix('+').unwrap_or(s);

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(UnitError::InvalidAmount(format!("malformed amount '{}'", amount)));
    }
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !all_digits(frac_part) {
        return Err(UnitError::InvalidAmount(format!("malformed amount '{}'", amount)));
    }

    let out_of_range = || UnitError::InvalidAmount(format!("amount '{}' out of range", amount));

    let whole: u128 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| out_of_range())?
    };

    let digits = frac_part.len().min(DECIMALS as usize);
    let mut frac: u128 = 0;
    for b in frac_part.bytes().take(digits) {
        frac = frac * 10 + u128::from(b - b'0');
    }
    frac *= 10u128.pow(DECIMALS - digits as u32);

    whole
        .checked_mul(SCALE)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(out_of_range)
}

/// Inverse of [`to_base_units`]. Exact for every input.
pub fn from_base_units(base_units: u128) -> TokenAmount {
    TokenAmount(base_units)
}

/// Decimal token amount backed by base units.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub fn base_units(&self) -> u128 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
    pub fn checked_add(self, rhs: TokenAmount) -> Option<TokenAmount> { self.0.checked_add(rhs.0).map(TokenAmount) }
    pub fn checked_sub(self, rhs: TokenAmount) -> Option<TokenAmount> { self.0.checked_sub(rhs.0).map(TokenAmount) }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let frac = self.0 % SCALE;
        if frac == 0 {
            return write!(f, "{}", whole);
        }
        let frac = format!("{:018}", frac);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self)
    }
}

impl FromStr for TokenAmount {
    type Err = UnitError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_base_units(s).map(TokenAmount)
    }
}

/* serialized as a decimal string; u128 does not survive JSON numbers */
impl Serialize for TokenAmount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        serializer.serialize_str(&self.to_string())
    }
}
impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> std::result::Result<TokenAmount, D::Error>
    where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        TokenAmount::from_str(&s).map_err(serde::de::Error::custom)
    }
}
