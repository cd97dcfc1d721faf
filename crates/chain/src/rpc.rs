//! JSON-RPC implementation of [`ChainTransport`] on an alloy provider.
//!
//! Methods used:
//!
//! | Method                      | Purpose                                   |
//! |-----------------------------|-------------------------------------------|
//! | `web3_clientVersion`        | connectivity check                        |
//! | `eth_call` (`latest`)       | read-only contract calls                  |
//! | `eth_chainId`               | replay protection, when not configured    |
//! | `eth_getTransactionCount`   | nonce (`pending`)                         |
//! | `eth_sendRawTransaction`    | broadcast a locally signed transaction    |
//! | `eth_getTransactionReceipt` | polled until the transaction is mined     |
//!
//! Transactions are legacy (EIP-155) envelopes signed locally with an
//! alloy `PrivateKeySigner`; the node never sees key material. Every
//! request is bounded by the configured timeout.

use std::future::IntoFuture;
use std::time::Duration;

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::BlockId;
use alloy::network::{Ethereum, ReceiptResponse};
use alloy::primitives::{Address as EvmAddress, Bytes, TxKind, B256, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest as EvmTransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::transports::TransportError as RpcFailure;
use async_trait::async_trait;
use parking_lot::Mutex;
use recicla_common::config::BlockchainConfig;
use recicla_common::crypto::Credential;
use recicla_common::types::TxHash;
use tracing::debug;

use crate::transport::{CallRequest, ChainTransport, Receipt, TransactionRequest, TransportError};

// ════════════════════════════════════════════════════════════════════════════
// CONFIG
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct JsonRpcConfig {
    pub rpc_url: String,
    /// Queried once via `eth_chainId` when absent.
    pub chain_id: Option<u64>,
    pub timeout_ms: u64,
    pub receipt_poll_interval_ms: u64,
    pub receipt_poll_attempts: u32,
}

impl From<&BlockchainConfig> for JsonRpcConfig {
    fn from(cfg: &BlockchainConfig) -> Self {
        Self {
            rpc_url: cfg.rpc_url.clone(),
            chain_id: cfg.chain_id,
            timeout_ms: cfg.timeout_ms,
            receipt_poll_interval_ms: cfg.receipt_poll_interval_ms,
            receipt_poll_attempts: cfg.receipt_poll_attempts,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ERROR MAPPING
// ════════════════════════════════════════════════════════════════════════════

/// JSON-RPC error objects keep their code and message verbatim.
fn map_rpc_error(e: RpcFailure) -> TransportError {
    if let Some(payload) = e.as_error_resp() {
        return TransportError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        };
    }
    if e.is_transport_error() {
        TransportError::Network(e.to_string())
    } else {
        TransportError::InvalidResponse(e.to_string())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SIGNING
// ════════════════════════════════════════════════════════════════════════════

fn legacy_transaction(request: &TransactionRequest, nonce: u64, chain_id: u64) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price: u128::from(request.gas_price),
        gas_limit: request.gas_limit,
        to: TxKind::Call(EvmAddress::from(request.to.0)),
        value: U256::ZERO,
        input: Bytes::from(request.data.clone()),
    }
}

/// Signs and encodes `tx`; returns the raw envelope and its hash.
fn sign_legacy(signer: &PrivateKeySigner, tx: TxLegacy) -> Result<(Vec<u8>, TxHash), TransportError> {
    let signature = signer
        .sign_hash_sync(&tx.signature_hash())
        .map_err(|e| TransportError::Signing(e.to_string()))?;
    let signed = tx.into_signed(signature);
    let hash = TxHash::from_bytes(signed.hash().0);
    let envelope = TxEnvelope::from(signed);
    Ok((envelope.encoded_2718(), hash))
}

// ════════════════════════════════════════════════════════════════════════════
// TRANSPORT
// ════════════════════════════════════════════════════════════════════════════

pub struct JsonRpcTransport {
    config: JsonRpcConfig,
    provider: RootProvider<Ethereum>,
    timeout: Duration,
    chain_id: Mutex<Option<u64>>,
    /// Held from nonce lookup until broadcast so concurrent sends from one
    /// signer do not pick the same nonce.
    send_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for JsonRpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcTransport")
            .field("config", &self.config)
            .field("provider", &"RootProvider<Ethereum>")
            .finish()
    }
}

impl JsonRpcTransport {
    pub fn new(config: JsonRpcConfig) -> Result<Self, TransportError> {
        let url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|e| TransportError::Network(format!("invalid rpc url '{}': {}", config.rpc_url, e)))?;
        let provider = RootProvider::<Ethereum>::new_http(url);
        let chain_id = Mutex::new(config.chain_id);
        Ok(Self {
            timeout: Duration::from_millis(config.timeout_ms),
            config,
            provider,
            chain_id,
            send_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn config(&self) -> &JsonRpcConfig {
        &self.config
    }

    /// Runs one provider request under the transport timeout.
    async fn timed<F, T>(&self, request: F) -> Result<T, TransportError>
    where
        F: IntoFuture<Output = Result<T, RpcFailure>>,
    {
        match tokio::time::timeout(self.timeout, request.into_future()).await {
            Ok(result) => result.map_err(map_rpc_error),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    async fn chain_id(&self) -> Result<u64, TransportError> {
        let cached = *self.chain_id.lock();
        if let Some(id) = cached {
            return Ok(id);
        }
        let id = self.timed(self.provider.get_chain_id()).await?;
        *self.chain_id.lock() = Some(id);
        Ok(id)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, TransportError> {
        let interval = Duration::from_millis(self.config.receipt_poll_interval_ms);
        let hash = B256::from(tx_hash.0);
        for attempt in 0..self.config.receipt_poll_attempts {
            let receipt = self.timed(self.provider.get_transaction_receipt(hash)).await?;
            if let Some(receipt) = receipt {
                if !receipt.status() {
                    return Err(TransportError::Reverted { tx_hash });
                }
                return Ok(Receipt {
                    transaction_hash: tx_hash,
                    block_number: receipt.block_number,
                });
            }
            debug!(tx_hash = %tx_hash, attempt, "receipt not available yet");
            tokio::time::sleep(interval).await;
        }
        Err(TransportError::ReceiptTimeout { tx_hash })
    }
}

#[async_trait]
impl ChainTransport for JsonRpcTransport {
    async fn client_version(&self) -> Result<String, TransportError> {
        self.timed(self.provider.get_client_version()).await
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, TransportError> {
        let tx = EvmTransactionRequest::default()
            .to(EvmAddress::from(request.to.0))
            .input(TransactionInput::new(Bytes::from(request.data.clone())));
        let output = self
            .timed(self.provider.call(tx).block(BlockId::latest()))
            .await?;
        Ok(output.to_vec())
    }

    async fn send_transaction(
        &self,
        signer: &Credential,
        request: &TransactionRequest,
    ) -> Result<Receipt, TransportError> {
        let chain_id = self.chain_id().await?;
        let wallet = PrivateKeySigner::from_signing_key(signer.signing_key().clone());
        let from = EvmAddress::from(signer.address().0);

        let tx_hash = {
            let _guard = self.send_lock.lock().await;
            let nonce = self
                .timed(self.provider.get_transaction_count(from).pending())
                .await?;
            let (raw, local_hash) = sign_legacy(&wallet, legacy_transaction(request, nonce, chain_id))?;
            debug!(from = %signer.address(), nonce, tx_hash = %local_hash, "broadcasting transaction");

            let pending = self.timed(self.provider.send_raw_transaction(&raw)).await?;
            TxHash::from_bytes(pending.tx_hash().0)
        };

        self.wait_for_receipt(tx_hash).await
    }
}
