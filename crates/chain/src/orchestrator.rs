//! # ActivityOrchestrator — Proposal / Approval Workflow
//!
//! ```text
//! propose_activity()            signed by the backend credential
//!      │
//!      ▼
//! Pending { approvals = 0 }
//!      │
//!      ├─ approve_activity()  ×quorum ──► Executed (contract mints)
//!      └─ reject_activity()   ×1      ──► Rejected
//! ```
//!
//! Both terminal states are final. Quorum and minting are the contract's
//! business; this layer only issues calls and reads state back.
//!
//! ## Outcome Policy
//!
//! - Sends never return an error past this layer: every failure becomes
//!   [`TransactionResult::Failure`] with the underlying message.
//! - Reads that fail return `None` (or skip the item during enumeration).
//! - No retries anywhere.
//!
//! ## Validator Credentials
//!
//! Approve and reject take the validator's raw key per call. The signer
//! is derived fresh each time and checked against the declared wallet
//! before anything is sent; it is dropped when the call returns.

use std::sync::Arc;

use recicla_common::abi::AbiValue;
use recicla_common::crypto::{Credential, CredentialError};
use recicla_common::result::TransactionResult;
use recicla_common::types::{ActivityProposal, Address, Material};
use tracing::{error, info, warn};

use crate::client::{ClientError, ContractClient};
use crate::contract::{
    LayoutError, ACTIVITY_AT, ACTIVITY_COUNTER, APPROVE_ACTIVITY, GET_ACTIVITY, PROPOSE_ACTIVITY,
    RAW_LAYOUT, REJECT_ACTIVITY, TYPED_LAYOUT,
};

/// Failure to fetch one activity record.
#[derive(Debug)]
enum FetchError {
    Client(ClientError),
    Layout(LayoutError),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(e) => write!(f, "{}", e),
            Self::Layout(e) => write!(f, "{}", e),
        }
    }
}

pub struct ActivityOrchestrator {
    client: ContractClient,
    backend: Arc<Credential>,
}

impl ActivityOrchestrator {
    pub fn new(client: ContractClient, backend: Arc<Credential>) -> Self {
        Self { client, backend }
    }

    pub fn client(&self) -> &ContractClient {
        &self.client
    }

    /// Logs the node's client version. Never fails the caller.
    pub async fn check_connectivity(&self) -> Option<String> {
        match self.client.client_version().await {
            Ok(version) => {
                info!(client_version = %version, contract = %self.client.contract(), "connected to chain node");
                Some(version)
            }
            Err(e) => {
                warn!(error = %e, "chain node not reachable");
                None
            }
        }
    }

    /// Proposes a recycling activity on behalf of `user_wallet`. The
    /// backend pays the fee. Weight and material are assumed validated.
    ///
    /// The contract does not return the new id. It is the counter minus
    /// one right after the receipt, unless another proposal landed in
    /// between; [`ActivityOrchestrator::propose_and_fetch`] does that
    /// lookup and checks the record.
    pub async fn propose_activity(
        &self,
        user_wallet: &Address,
        weight_kg: u64,
        material: Material,
        evidence_ref: &str,
    ) -> TransactionResult {
        info!(
            user = %user_wallet,
            material = %material,
            weight_kg,
            evidence = evidence_ref,
            "proposing activity"
        );
        let args = [
            AbiValue::Address(*user_wallet),
            AbiValue::Uint(weight_kg as u128),
            AbiValue::String(material.as_contract_str().to_string()),
            AbiValue::String(evidence_ref.to_string()),
        ];
        match self.client.send_and_wait(&self.backend, &PROPOSE_ACTIVITY, &args).await {
            Ok(receipt) => {
                info!(tx_hash = %receipt.transaction_hash, "activity proposed, awaiting validators");
                TransactionResult::success(receipt.transaction_hash, receipt.block_number)
            }
            Err(e) => {
                error!(error = %e, "activity proposal failed");
                TransactionResult::from_error(&e)
            }
        }
    }

    /// Proposes, then reads back the newest activity and returns it with
    /// the proposal's transaction hash and block filled in.
    ///
    /// The proposal is `None` when the send failed, the read failed, or the
    /// newest record does not match what was proposed (a concurrent
    /// proposal won the slot). The send result is returned either way.
    pub async fn propose_and_fetch(
        &self,
        user_wallet: &Address,
        weight_kg: u64,
        material: Material,
        evidence_ref: &str,
    ) -> (TransactionResult, Option<ActivityProposal>) {
        let result = self.propose_activity(user_wallet, weight_kg, material, evidence_ref).await;
        let Some(tx_hash) = result.transaction_hash().copied() else {
            return (result, None);
        };

        let id = match self.activity_count().await {
            Ok(0) => {
                warn!(tx_hash = %tx_hash, "activity counter still zero after proposal");
                return (result, None);
            }
            Ok(n) => n - 1,
            Err(e) => {
                warn!(tx_hash = %tx_hash, error = %e, "could not read activity counter after proposal");
                return (result, None);
            }
        };
        let Some(mut proposal) = self.get_activity(id).await else {
            return (result, None);
        };

        let same = proposal.user_wallet == *user_wallet
            && proposal.weight_kg == weight_kg
            && proposal.material_raw == material.as_contract_str()
            && proposal.evidence_ref == evidence_ref;
        if !same {
            warn!(activity_id = id, tx_hash = %tx_hash, "newest activity is not ours, id unknown");
            return (result, None);
        }

        proposal.transaction_hash = Some(tx_hash);
        proposal.block_number = result.block_number();
        info!(activity_id = id, tx_hash = %tx_hash, "proposal stored");
        (result, Some(proposal))
    }

    /// Approves `activity_id` as the validator owning `validator_wallet`.
    ///
    /// `Err` means the key was malformed or does not control the declared
    /// wallet; nothing was sent. Every other outcome is a
    /// [`TransactionResult`].
    pub async fn approve_activity(
        &self,
        activity_id: u64,
        validator_wallet: &Address,
        validator_key: &str,
    ) -> Result<TransactionResult, CredentialError> {
        let signer = validator_signer(validator_wallet, validator_key)?;
        info!(activity_id, validator = %validator_wallet, "validator approving activity");

        let args = [AbiValue::Uint(activity_id as u128)];
        Ok(match self.client.send_and_wait(&signer, &APPROVE_ACTIVITY, &args).await {
            Ok(receipt) => {
                info!(activity_id, tx_hash = %receipt.transaction_hash, "activity approved");
                TransactionResult::success(receipt.transaction_hash, receipt.block_number)
            }
            Err(e) => {
                error!(activity_id, error = %e, "activity approval failed");
                TransactionResult::from_error(&e)
            }
        })
    }

    /// Rejects `activity_id` with `reason`. Same credential rules as
    /// [`ActivityOrchestrator::approve_activity`].
    pub async fn reject_activity(
        &self,
        activity_id: u64,
        reason: &str,
        validator_wallet: &Address,
        validator_key: &str,
    ) -> Result<TransactionResult, CredentialError> {
        let signer = validator_signer(validator_wallet, validator_key)?;
        info!(activity_id, validator = %validator_wallet, reason, "validator rejecting activity");

        let args = [AbiValue::Uint(activity_id as u128), AbiValue::String(reason.to_string())];
        Ok(match self.client.send_and_wait(&signer, &REJECT_ACTIVITY, &args).await {
            Ok(receipt) => {
                info!(activity_id, tx_hash = %receipt.transaction_hash, "activity rejected");
                TransactionResult::success(receipt.transaction_hash, receipt.block_number)
            }
            Err(e) => {
                error!(activity_id, error = %e, "activity rejection failed");
                TransactionResult::from_error(&e)
            }
        })
    }

    /// Typed read of one activity. `None` covers both "not found" and
    /// "unreadable".
    pub async fn get_activity(&self, activity_id: u64) -> Option<ActivityProposal> {
        match self.fetch_typed(activity_id).await {
            Ok(proposal) => Some(proposal),
            Err(e) => {
                error!(activity_id, error = %e, "activity read failed");
                None
            }
        }
    }

    async fn fetch_typed(&self, activity_id: u64) -> Result<ActivityProposal, FetchError> {
        let values = self
            .client
            .typed_read(&GET_ACTIVITY, &[AbiValue::Uint(activity_id as u128)])
            .await
            .map_err(FetchError::Client)?;
        let fields = values
            .into_iter()
            .next()
            .and_then(AbiValue::into_tuple)
            .unwrap_or_default();
        TYPED_LAYOUT.to_proposal(activity_id, &fields).map_err(FetchError::Layout)
    }

    async fn fetch_raw(&self, activity_id: u64) -> Result<ActivityProposal, FetchError> {
        let values = self
            .client
            .raw_read(&ACTIVITY_AT, &[AbiValue::Uint(activity_id as u128)])
            .await
            .map_err(FetchError::Client)?;
        RAW_LAYOUT.to_proposal(activity_id, &values).map_err(FetchError::Layout)
    }

    /// Number of activities ever proposed. Empty return data counts as 0.
    pub async fn activity_count(&self) -> Result<u64, ClientError> {
        let values = self.client.raw_read(&ACTIVITY_COUNTER, &[]).await?;
        match values.first() {
            None => Ok(0),
            Some(v) => v
                .as_uint()
                .and_then(|n| u64::try_from(n).ok())
                .ok_or(ClientError::UnexpectedShape {
                    function: ACTIVITY_COUNTER.name,
                    found: values.len(),
                    expected: 1,
                }),
        }
    }

    /// Every activity that is neither executed nor rejected, ascending by
    /// id. Recomputed on each call; records that cannot be read are
    /// logged and skipped.
    pub async fn list_pending_activities(&self) -> Vec<ActivityProposal> {
        let total = match self.activity_count().await {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "could not read activity counter");
                return Vec::new();
            }
        };
        info!(total, "scanning activities");

        let mut pending = Vec::new();
        for id in 0..total {
            match self.fetch_raw(id).await {
                Ok(p) if p.is_pending() => pending.push(p),
                Ok(_) => {}
                Err(e) => warn!(activity_id = id, error = %e, "skipping unreadable activity"),
            }
        }
        info!(pending = pending.len(), "pending activities found");
        pending
    }
}

/// Derives the signer from raw key material and checks it controls the
/// declared wallet.
fn validator_signer(declared: &Address, key_hex: &str) -> Result<Credential, CredentialError> {
    let signer = Credential::from_private_key_hex(key_hex)?;
    if let Err(e) = signer.verify_matches(declared) {
        warn!(declared = %declared, derived = %signer.address(), "validator credential mismatch");
        return Err(e);
    }
    Ok(signer)
}
