//! # Integration — Optional Chain and Evidence Capabilities
//!
//! The application runs with or without a chain node and with or without
//! an evidence store. Both are injected at startup as optional
//! capabilities, and every call site below picks a documented degraded
//! behaviour when one is missing:
//!
//! | Operation         | No chain / no wallet | Chain failure                  |
//! |-------------------|----------------------|--------------------------------|
//! | `submit_activity` | `Skipped`, local only| reported, local record kept    |
//! | `register_user`   | `Skipped`            | per [`RegistrationPolicy`]     |
//! | `redeem`          | `Skipped`            | reported, redemption continues |
//!
//! A missing evidence store, or a failed upload, falls back to the
//! placeholder [`PENDING_EVIDENCE`] and the proposal still goes out.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use recicla_common::cid::PENDING_EVIDENCE;
use recicla_common::config::{AppConfig, BlockchainConfig, ConfigError, RegistrationPolicy};
use recicla_common::crypto::Credential;
use recicla_common::result::TransactionResult;
use recicla_common::types::{Address, Material};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::accounts::AccountService;
use crate::client::{ContractClient, GasSettings};
use crate::evidence::{EvidenceError, EvidenceFile, EvidenceStore, PinataEvidenceStore};
use crate::orchestrator::ActivityOrchestrator;
use crate::rpc::{JsonRpcConfig, JsonRpcTransport};
use crate::transport::{ChainTransport, TransportError};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("chain transport setup failed: {0}")]
    Transport(#[from] TransportError),

    #[error("evidence store setup failed: {0}")]
    Evidence(#[from] EvidenceError),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Strict policy: signup must not complete.
    #[error("chain registration failed: {0}")]
    ChainRegistrationFailed(String),
}

// ════════════════════════════════════════════════════════════════════════════
// CHAIN SERVICE
// ════════════════════════════════════════════════════════════════════════════

/// Everything that talks to the token contract, sharing one transport and
/// one backend credential.
pub struct ChainService {
    pub activities: ActivityOrchestrator,
    pub accounts: AccountService,
}

impl ChainService {
    pub fn new(
        transport: Arc<dyn ChainTransport>,
        token: Address,
        gas: GasSettings,
        backend: Credential,
    ) -> Self {
        let client = ContractClient::new(transport, token, gas);
        let backend = Arc::new(backend);
        Self {
            activities: ActivityOrchestrator::new(client.clone(), backend.clone()),
            accounts: AccountService::new(client, backend),
        }
    }

    /// Builds the JSON-RPC backed service from a validated section.
    pub fn from_config(cfg: &BlockchainConfig) -> Result<Self, SetupError> {
        cfg.validate()?;
        let token = cfg.token_address()?;
        let backend = cfg.backend_credential()?;
        let transport = JsonRpcTransport::new(JsonRpcConfig::from(cfg))?;
        info!(token = %token, backend = %backend.address(), rpc = %cfg.rpc_url, "chain service configured");
        Ok(Self::new(Arc::new(transport), token, GasSettings::from(cfg), backend))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainWrite {
    /// Nothing was sent; the operation stays local.
    Skipped { reason: &'static str },
    /// A send was attempted; the result says how it went.
    Submitted(TransactionResult),
}

impl ChainWrite {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Submitted(r) if r.is_success())
    }
}

/// Outcome of recording one recycling delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivitySubmission {
    /// Content id sent with the proposal. `None` when nothing was proposed.
    pub evidence_ref: Option<String>,
    pub chain: ChainWrite,
}

/// A recycling delivery as recorded by the application.
#[derive(Debug, Clone)]
pub struct ActivityRequest<'a> {
    pub user_name: &'a str,
    pub user_wallet: Option<Address>,
    pub weight_kg: u64,
    /// Catalogue name of the waste type; mapped to a [`Material`].
    pub waste_name: &'a str,
    pub evidence: Option<&'a EvidenceFile>,
}

// ════════════════════════════════════════════════════════════════════════════
// INTEGRATION
// ════════════════════════════════════════════════════════════════════════════

pub struct Integration {
    chain: Option<Arc<ChainService>>,
    evidence: Option<Arc<dyn EvidenceStore>>,
    policy: RegistrationPolicy,
}

impl Integration {
    pub fn new(
        chain: Option<Arc<ChainService>>,
        evidence: Option<Arc<dyn EvidenceStore>>,
        policy: RegistrationPolicy,
    ) -> Self {
        Self { chain, evidence, policy }
    }

    /// Wires capabilities from configuration. A disabled chain section or
    /// an absent evidence section leaves that capability out.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, SetupError> {
        let chain = if cfg.blockchain.enabled {
            Some(Arc::new(ChainService::from_config(&cfg.blockchain)?))
        } else {
            info!("blockchain integration disabled");
            None
        };
        let evidence: Option<Arc<dyn EvidenceStore>> = match &cfg.evidence {
            Some(ev) => Some(Arc::new(PinataEvidenceStore::new(ev.clone())?)),
            None => {
                info!("evidence store not configured");
                None
            }
        };
        Ok(Self::new(chain, evidence, cfg.registration_policy))
    }

    pub fn chain(&self) -> Option<&Arc<ChainService>> {
        self.chain.as_ref()
    }

    pub fn policy(&self) -> RegistrationPolicy {
        self.policy
    }

    /// Uploads evidence when possible and proposes the activity on chain.
    /// The local record is never blocked by either collaborator.
    pub async fn submit_activity(&self, request: &ActivityRequest<'_>) -> ActivitySubmission {
        let (chain, wallet) = match (&self.chain, request.user_wallet) {
            (Some(chain), Some(wallet)) => (chain, wallet),
            _ => {
                info!(user = request.user_name, "blockchain disabled or user has no wallet");
                return ActivitySubmission {
                    evidence_ref: None,
                    chain: ChainWrite::Skipped { reason: "blockchain disabled or user has no wallet" },
                };
            }
        };

        let evidence_ref = self.upload_evidence(request).await;
        let material = Material::from_waste_name(request.waste_name);
        let result = chain
            .activities
            .propose_activity(&wallet, request.weight_kg, material, &evidence_ref)
            .await;
        if !result.is_success() {
            warn!(user = request.user_name, error = result.error_message().unwrap_or_default(), "activity kept local only");
        }
        ActivitySubmission {
            evidence_ref: Some(evidence_ref),
            chain: ChainWrite::Submitted(result),
        }
    }

    async fn upload_evidence(&self, request: &ActivityRequest<'_>) -> String {
        let (store, file) = match (&self.evidence, request.evidence) {
            (Some(store), Some(file)) if !file.bytes.is_empty() => (store, file),
            _ => return PENDING_EVIDENCE.to_string(),
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let metadata = json!({
            "usuario": request.user_name,
            "material": request.waste_name,
            "peso": request.weight_kg,
            "fecha": now,
        });
        match store.upload_evidence(file, &metadata).await {
            Ok(cid) => cid,
            Err(e) => {
                error!(error = %e, "evidence upload failed, using placeholder");
                PENDING_EVIDENCE.to_string()
            }
        }
    }

    /// Whitelists a newly signed-up wallet. Under [`RegistrationPolicy::Strict`]
    /// a failed send is an error and the signup must abort.
    pub async fn register_user(
        &self,
        wallet: &Address,
        national_id: &str,
    ) -> Result<ChainWrite, RegistrationError> {
        let Some(chain) = &self.chain else {
            warn!(wallet = %wallet, "blockchain disabled, registration skipped");
            return Ok(ChainWrite::Skipped { reason: "blockchain disabled" });
        };
        let result = chain.accounts.register_user_on_chain(wallet, national_id).await;
        match (result.error_message(), self.policy) {
            (Some(msg), RegistrationPolicy::Strict) => {
                Err(RegistrationError::ChainRegistrationFailed(msg.to_string()))
            }
            (Some(msg), RegistrationPolicy::BestEffort) => {
                warn!(wallet = %wallet, error = msg, "registration failed, signup continues");
                Ok(ChainWrite::Submitted(result))
            }
            (None, _) => Ok(ChainWrite::Submitted(result)),
        }
    }

    /// Burns tokens for a redemption. Failures never stop the redemption.
    pub async fn redeem(&self, wallet: Option<&Address>, amount: &str, description: &str) -> ChainWrite {
        let (chain, wallet) = match (&self.chain, wallet) {
            (Some(chain), Some(wallet)) => (chain, wallet),
            _ => {
                info!("blockchain disabled or user has no wallet");
                return ChainWrite::Skipped { reason: "blockchain disabled or user has no wallet" };
            }
        };
        let result = chain.accounts.burn_for_redemption(wallet, amount, description).await;
        if !result.is_success() {
            warn!(wallet = %wallet, error = result.error_message().unwrap_or_default(), "burn failed, redemption continues");
        }
        ChainWrite::Submitted(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockChainTransport, Receipt};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use recicla_common::abi::AbiValue;
    use recicla_common::types::TxHash;
    use serde_json::Value;

    use crate::contract::PROPOSE_ACTIVITY;

    const BACKEND_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    struct FakeStore {
        fail: bool,
        uploads: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl EvidenceStore for FakeStore {
        async fn upload_evidence(&self, _file: &EvidenceFile, metadata: &Value) -> Result<String, EvidenceError> {
            self.uploads.lock().push(metadata.clone());
            if self.fail {
                Err(EvidenceError::Timeout)
            } else {
                Ok(CID.to_string())
            }
        }
        async fn upload_metadata(&self, _document: &Value) -> Result<String, EvidenceError> {
            Ok(CID.to_string())
        }
        async fn retrieve(&self, _cid: &str) -> Result<Vec<u8>, EvidenceError> {
            Ok(Vec::new())
        }
    }

    fn chain() -> (Arc<MockChainTransport>, Arc<ChainService>) {
        let mock = Arc::new(MockChainTransport::new());
        let svc = ChainService::new(
            mock.clone(),
            Address::from_bytes([0xC0; 20]),
            GasSettings { gas_price: 1, gas_limit: 3_000_000 },
            Credential::from_private_key_hex(BACKEND_KEY).unwrap(),
        );
        (mock, Arc::new(svc))
    }

    fn ok_receipt() -> Receipt {
        Receipt { transaction_hash: TxHash::from_bytes([7; 32]), block_number: Some(7) }
    }

    fn photo() -> EvidenceFile {
        EvidenceFile { file_name: "foto.jpg".into(), content_type: "image/jpeg".into(), bytes: vec![1, 2] }
    }

    fn request<'a>(wallet: Option<Address>, evidence: Option<&'a EvidenceFile>) -> ActivityRequest<'a> {
        ActivityRequest {
            user_name: "ana",
            user_wallet: wallet,
            weight_kg: 10,
            waste_name: "Botellas de plástico",
            evidence,
        }
    }

    #[tokio::test]
    async fn no_chain_skips() {
        let integ = Integration::new(None, None, RegistrationPolicy::Strict);
        let out = integ.submit_activity(&request(Some(Address::default()), None)).await;
        assert!(matches!(out.chain, ChainWrite::Skipped { .. }));
        assert!(out.evidence_ref.is_none());
        assert!(matches!(
            integ.register_user(&Address::default(), "1").await,
            Ok(ChainWrite::Skipped { .. })
        ));
        assert!(matches!(integ.redeem(None, "1", "x").await, ChainWrite::Skipped { .. }));
    }

    #[tokio::test]
    async fn no_wallet_skips_without_sending() {
        let (mock, svc) = chain();
        let integ = Integration::new(Some(svc), None, RegistrationPolicy::Strict);
        let out = integ.submit_activity(&request(None, None)).await;
        assert!(matches!(out.chain, ChainWrite::Skipped { .. }));
        assert_eq!(mock.send_count(), 0);
    }

    #[tokio::test]
    async fn missing_store_uses_placeholder() {
        let (mock, svc) = chain();
        mock.push_receipt(ok_receipt());
        let integ = Integration::new(Some(svc), None, RegistrationPolicy::Strict);
        let wallet = Address::from_bytes([0xAA; 20]);
        let file = photo();
        let out = integ.submit_activity(&request(Some(wallet), Some(&file))).await;
        assert_eq!(out.evidence_ref.as_deref(), Some(PENDING_EVIDENCE));
        assert!(out.chain.is_confirmed());
        let expected = PROPOSE_ACTIVITY
            .encode_call(&[
                AbiValue::Address(wallet),
                AbiValue::Uint(10),
                AbiValue::String("plastico".into()),
                AbiValue::String(PENDING_EVIDENCE.into()),
            ])
            .unwrap();
        assert_eq!(mock.sent_transactions()[0].request.data, expected);
    }

    #[tokio::test]
    async fn failed_upload_still_proposes() {
        let (mock, svc) = chain();
        mock.push_receipt(ok_receipt());
        let store = Arc::new(FakeStore { fail: true, uploads: Mutex::new(Vec::new()) });
        let integ = Integration::new(Some(svc), Some(store.clone() as Arc<dyn EvidenceStore>), RegistrationPolicy::Strict);
        let file = photo();
        let out = integ
            .submit_activity(&request(Some(Address::from_bytes([0xAA; 20])), Some(&file)))
            .await;
        assert_eq!(out.evidence_ref.as_deref(), Some(PENDING_EVIDENCE));
        assert_eq!(store.uploads.lock().len(), 1);
        assert_eq!(mock.send_count(), 1);
    }

    #[tokio::test]
    async fn uploaded_cid_goes_on_chain() {
        let (mock, svc) = chain();
        mock.push_receipt(ok_receipt());
        let store = Arc::new(FakeStore { fail: false, uploads: Mutex::new(Vec::new()) });
        let integ = Integration::new(Some(svc), Some(store.clone() as Arc<dyn EvidenceStore>), RegistrationPolicy::Strict);
        let file = photo();
        let out = integ
            .submit_activity(&request(Some(Address::from_bytes([0xAA; 20])), Some(&file)))
            .await;
        assert_eq!(out.evidence_ref.as_deref(), Some(CID));
        let meta = store.uploads.lock()[0].clone();
        assert_eq!(meta["usuario"], "ana");
        assert_eq!(meta["peso"], 10);
    }

    #[tokio::test]
    async fn strict_registration_failure_is_error() {
        let (mock, svc) = chain();
        mock.push_send_error(TransportError::Timeout);
        let integ = Integration::new(Some(svc), None, RegistrationPolicy::Strict);
        let err = integ.register_user(&Address::from_bytes([1; 20]), "123").await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn best_effort_registration_failure_continues() {
        let (mock, svc) = chain();
        mock.push_send_error(TransportError::Timeout);
        let integ = Integration::new(Some(svc), None, RegistrationPolicy::BestEffort);
        let out = integ.register_user(&Address::from_bytes([1; 20]), "123").await.unwrap();
        assert!(matches!(out, ChainWrite::Submitted(ref r) if !r.is_success()));
    }

    #[tokio::test]
    async fn redeem_failure_is_reported_not_raised() {
        let (_mock, svc) = chain();
        let integ = Integration::new(Some(svc), None, RegistrationPolicy::Strict);
        let out = integ.redeem(Some(&Address::from_bytes([1; 20])), "-5", "canje").await;
        assert!(matches!(out, ChainWrite::Submitted(ref r) if !r.is_success()));
    }

    #[test]
    fn disabled_config_has_no_capabilities() {
        let integ = Integration::from_config(&AppConfig::default()).unwrap();
        assert!(integ.chain().is_none());
        assert_eq!(integ.policy(), RegistrationPolicy::Strict);
    }
}
