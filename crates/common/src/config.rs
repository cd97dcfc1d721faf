//! Config loader using TOML and serde, with an environment-variable path
//! for deployments that do not ship a file.
//!
//! ```toml
//! registration_policy = "strict"
//!
//! [blockchain]
//! enabled = true
//! rpc_url = "http://127.0.0.1:8545"
//! backend_private_key = "0x..."
//! token_address = "0x..."
//!
//! [evidence]
//! pinata_api_key = "..."
//! pinata_secret_key = "..."
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::crypto::Credential;
use crate::types::Address;

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";
pub const DEFAULT_GAS_PRICE: u64 = 20_000_000_000;
pub const DEFAULT_GAS_LIMIT: u64 = 3_000_000;
pub const DEFAULT_PINATA_API: &str = "https://api.pinata.cloud";
pub const DEFAULT_PINATA_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{name} invalid: '{value}'")]
    InvalidEnv { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// What happens to signup when whitelisting the new wallet fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// Registration failure aborts the signup.
    #[default]
    Strict,
    /// Registration failure is logged and the signup continues.
    BestEffort,
}

impl std::str::FromStr for RegistrationPolicy {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(ConfigError::InvalidEnv {
                name: "RECICLA_REGISTRATION_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub blockchain: BlockchainConfig,

    /// Evidence upload is optional; absent means uploads are skipped.
    pub evidence: Option<EvidenceConfig>,

    #[serde(default)]
    pub registration_policy: RegistrationPolicy,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// Chain integration is off unless explicitly enabled.
    pub enabled: bool,
    pub rpc_url: String,
    /// Backend signing key. Pays for every backend-initiated send.
    pub backend_private_key: String,
    /// Token contract address.
    pub token_address: String,
    /// Legacy gas price in wei.
    pub gas_price: u64,
    pub gas_limit: u64,
    /// Queried from the node when absent.
    pub chain_id: Option<u64>,
    /// HTTP timeout of a single RPC request.
    pub timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_poll_attempts: u32,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            backend_private_key: String::new(),
            token_address: String::new(),
            gas_price: DEFAULT_GAS_PRICE,
            gas_limit: DEFAULT_GAS_LIMIT,
            chain_id: None,
            timeout_ms: 30_000,
            receipt_poll_interval_ms: 1_000,
            receipt_poll_attempts: 120,
        }
    }
}

impl fmt::Debug for BlockchainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockchainConfig")
            .field("enabled", &self.enabled)
            .field("rpc_url", &self.rpc_url)
            .field("backend_private_key", &"<redacted>")
            .field("token_address", &self.token_address)
            .field("gas_price", &self.gas_price)
            .field("gas_limit", &self.gas_limit)
            .field("chain_id", &self.chain_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("receipt_poll_interval_ms", &self.receipt_poll_interval_ms)
            .field("receipt_poll_attempts", &self.receipt_poll_attempts)
            .finish()
    }
}

impl BlockchainConfig {
    /// Checks an enabled section. A disabled section is always valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid("blockchain.rpc_url is empty".to_string()));
        }
        self.token_address()?;
        self.backend_credential()?;
        if self.receipt_poll_attempts == 0 {
            return Err(ConfigError::Invalid(
                "blockchain.receipt_poll_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn token_address(&self) -> Result<Address, ConfigError> {
        Address::from_hex(&self.token_address)
            .map_err(|e| ConfigError::Invalid(format!("blockchain.token_address: {}", e)))
    }

    pub fn backend_credential(&self) -> Result<Credential, ConfigError> {
        Credential::from_private_key_hex(&self.backend_private_key)
            .map_err(|e| ConfigError::Invalid(format!("blockchain.backend_private_key: {}", e)))
    }
}

#[derive(Clone, Deserialize)]
pub struct EvidenceConfig {
    pub pinata_api_key: String,
    pub pinata_secret_key: String,
    #[serde(default = "default_pinata_api")]
    pub api_base: String,
    #[serde(default = "default_pinata_gateway")]
    pub gateway: String,
    #[serde(default = "default_evidence_timeout")]
    pub timeout_ms: u64,
}

fn default_pinata_api() -> String { DEFAULT_PINATA_API.to_string() }
fn default_pinata_gateway() -> String { DEFAULT_PINATA_GATEWAY.to_string() }
fn default_evidence_timeout() -> u64 { 60_000 }

impl fmt::Debug for EvidenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidenceConfig")
            .field("pinata_api_key", &self.pinata_api_key)
            .field("pinata_secret_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("gateway", &self.gateway)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl AppConfig {
    /// Reads configuration from `RECICLA_*` environment variables.
    ///
    /// - `RECICLA_BLOCKCHAIN_ENABLED` (`true`/`false`, default false)
    /// - `RECICLA_RPC_URL`, `RECICLA_BACKEND_PRIVATE_KEY`, `RECICLA_TOKEN_ADDRESS`
    /// - `RECICLA_GAS_PRICE`, `RECICLA_GAS_LIMIT`, `RECICLA_CHAIN_ID` (optional numerics)
    /// - `RECICLA_PINATA_API_KEY` + `RECICLA_PINATA_SECRET_KEY` (both or no evidence store)
    /// - `RECICLA_REGISTRATION_POLICY` (`strict` or `best_effort`)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut bc = BlockchainConfig::default();

        if let Some(val) = lookup("RECICLA_BLOCKCHAIN_ENABLED") {
            bc.enabled = match val.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" | "" => false,
                _ => return Err(ConfigError::InvalidEnv { name: "RECICLA_BLOCKCHAIN_ENABLED", value: val }),
            };
        }
        if let Some(val) = lookup("RECICLA_RPC_URL") {
            bc.rpc_url = val;
        }
        if let Some(val) = lookup("RECICLA_BACKEND_PRIVATE_KEY") {
            bc.backend_private_key = val;
        }
        if let Some(val) = lookup("RECICLA_TOKEN_ADDRESS") {
            bc.token_address = val;
        }
        if let Some(val) = lookup("RECICLA_GAS_PRICE") {
            bc.gas_price = val
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "RECICLA_GAS_PRICE", value: val.clone() })?;
        }
        if let Some(val) = lookup("RECICLA_GAS_LIMIT") {
            bc.gas_limit = val
                .parse()
                .map_err(|_| ConfigError::InvalidEnv { name: "RECICLA_GAS_LIMIT", value: val.clone() })?;
        }
        if let Some(val) = lookup("RECICLA_CHAIN_ID") {
            bc.chain_id = Some(
                val.parse()
                    .map_err(|_| ConfigError::InvalidEnv { name: "RECICLA_CHAIN_ID", value: val.clone() })?,
            );
        }

        let evidence = match (lookup("RECICLA_PINATA_API_KEY"), lookup("RECICLA_PINATA_SECRET_KEY")) {
            (Some(api), Some(secret)) => Some(EvidenceConfig {
                pinata_api_key: api,
                pinata_secret_key: secret,
                api_base: default_pinata_api(),
                gateway: default_pinata_gateway(),
                timeout_ms: default_evidence_timeout(),
            }),
            _ => None,
        };

        let registration_policy = match lookup("RECICLA_REGISTRATION_POLICY") {
            Some(val) => val.parse()?,
            None => RegistrationPolicy::default(),
        };

        let cfg = AppConfig { blockchain: bc, evidence, registration_policy };
        cfg.blockchain.validate()?;
        Ok(cfg)
    }
}

/// Load config from a TOML file path and validate it.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let s = fs::read_to_string(path.as_ref())?;
    let cfg: AppConfig = toml::from_str(&s)?;
    cfg.blockchain.validate()?;
    Ok(cfg)
}
