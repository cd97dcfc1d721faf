//! Uniform outcome of every state-changing chain call.
//!
//! Callers always receive a value: failures are folded into
//! [`TransactionResult::Failure`] with the underlying message verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::TxHash;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionResult {
    /// Transaction mined.
    Success {
        transaction_hash: TxHash,
        block_number: Option<u64>,
    },
    /// Nothing was confirmed on chain.
    Failure {
        error_message: String,
    },
}

impl TransactionResult {
    pub fn success(transaction_hash: TxHash, block_number: Option<u64>) -> Self {
        Self::Success { transaction_hash, block_number }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self::Failure { error_message: error_message.into() }
    }

    pub fn from_error<E: fmt::Display>(err: &E) -> Self {
        Self::failure(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn transaction_hash(&self) -> Option<&TxHash> {
        match self {
            Self::Success { transaction_hash, .. } => Some(transaction_hash),
            Self::Failure { .. } => None,
        }
    }

    pub fn block_number(&self) -> Option<u64> {
        match self {
            Self::Success { block_number, .. } => *block_number,
            Self::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error_message } => Some(error_message),
        }
    }
}

impl fmt::Display for TransactionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { transaction_hash, block_number: Some(b) } => {
                write!(f, "success tx={} block={}", transaction_hash, b)
            }
            Self::Success { transaction_hash, block_number: None } => {
                write!(f, "success tx={}", transaction_hash)
            }
            Self::Failure { error_message } => write!(f, "failure: {}", error_message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_no_error() {
        let r = TransactionResult::success(TxHash::from_bytes([1; 32]), Some(9));
        assert!(r.is_success());
        assert_eq!(r.block_number(), Some(9));
        assert!(r.error_message().is_none());
    }

    #[test]
    fn failure_carries_no_hash() {
        let r = TransactionResult::failure("execution reverted: not validator");
        assert!(!r.is_success());
        assert!(r.transaction_hash().is_none());
        assert_eq!(r.error_message(), Some("execution reverted: not validator"));
    }

    #[test]
    fn serde_shape() {
        let r = TransactionResult::success(TxHash::from_bytes([0xAB; 32]), None);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["transaction_hash"], format!("0x{}", "ab".repeat(32)));

        let f = serde_json::to_value(TransactionResult::failure("boom")).unwrap();
        assert_eq!(f["status"], "failure");
        assert_eq!(f["error_message"], "boom");
    }
}
