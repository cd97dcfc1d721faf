//! # Recicla Common Crate
//!
//! Shared building blocks for the recycling-rewards chain client.
//!
//! ## Modules
//! - `types`: Address, TxHash, Material, ActivityProposal, BalanceSnapshot
//! - `units`: conversion between 18-decimal base units and token amounts
//! - `abi`: contract call encoding and return-data decoding
//! - `result`: the success/failure envelope of state-changing calls
//! - `crypto`: keccak-256 and secp256k1 signing credentials
//! - `cid`: evidence content identifier helpers
//! - `config`: TOML / environment configuration
//!
//! ## Usage
//! ```rust,ignore
//! let base = to_base_units("12.5")?;
//! let amount = from_base_units(base);
//! assert_eq!(amount.to_string(), "12.5");
//! ```

pub mod abi;
pub mod cid;
pub mod config;
pub mod crypto;
pub mod result;
pub mod types;
pub mod units;

pub use abi::{AbiError, AbiType, AbiValue, FunctionDescriptor};
pub use config::{AppConfig, BlockchainConfig, ConfigError, EvidenceConfig, RegistrationPolicy};
pub use crypto::{Credential, CredentialError};
pub use result::TransactionResult;
pub use types::{ActivityProposal, ActivityState, Address, BalanceSnapshot, Material, TxHash, TypeError};
pub use units::{from_base_units, to_base_units, TokenAmount, UnitError};
