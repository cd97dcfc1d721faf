//! # ChainTransport — RPC Seam
//!
//! Everything the contract client needs from a node, behind one async
//! trait:
//!
//! ```text
//! ContractClient
//!      │
//!      ├─ call(CallRequest)                 → raw return bytes
//!      ├─ send_transaction(signer, request) → Receipt (mined)
//!      └─ client_version()                  → node identity string
//!      │
//!      ▼
//! dyn ChainTransport { JsonRpcTransport | MockChainTransport }
//! ```
//!
//! ## No Implicit Retry
//!
//! A transport performs exactly one attempt per call. It does NOT retry,
//! back off, or reinterpret a failure. Retry policy belongs to whoever
//! invokes the workflow.
//!
//! ## Blocking Send
//!
//! `send_transaction` resolves only once the transaction is mined (or
//! the transport gives up waiting). There is no pending-transaction
//! tracking above this point.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use recicla_common::crypto::Credential;
use recicla_common::types::{Address, TxHash};

// ════════════════════════════════════════════════════════════════════════════════
// REQUESTS
// ════════════════════════════════════════════════════════════════════════════════

/// Read-only call evaluated against the latest block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub data: Vec<u8>,
}

/// State-changing contract call. Nonce and chain id are filled in by the
/// transport at signing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub data: Vec<u8>,
    pub gas_limit: u64,
    /// Legacy gas price in wei.
    pub gas_price: u64,
}

/// Receipt of a mined, successful transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
}

// ════════════════════════════════════════════════════════════════════════════════
// ERROR
// ════════════════════════════════════════════════════════════════════════════════

/// Transport-level or contract-level failure of a single RPC interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// HTTP / connection failure.
    Network(String),
    /// The request exceeded the transport's own timeout.
    Timeout,
    /// JSON-RPC error object returned by the node. Message kept verbatim.
    Rpc { code: i64, message: String },
    /// Node response could not be interpreted.
    InvalidResponse(String),
    /// Transaction could not be signed with the supplied credential.
    Signing(String),
    /// Mined with status 0.
    Reverted { tx_hash: TxHash },
    /// Receipt did not appear within the polling window.
    ReceiptTimeout { tx_hash: TxHash },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "rpc network error: {}", msg),
            Self::Timeout => write!(f, "rpc request timed out"),
            Self::Rpc { code, message } => write!(f, "rpc error {}: {}", code, message),
            Self::InvalidResponse(msg) => write!(f, "invalid rpc response: {}", msg),
            Self::Signing(msg) => write!(f, "transaction signing failed: {}", msg),
            Self::Reverted { tx_hash } => write!(f, "transaction {} reverted", tx_hash),
            Self::ReceiptTimeout { tx_hash } => {
                write!(f, "transaction {} not mined before timeout", tx_hash)
            }
        }
    }
}

impl std::error::Error for TransportError {}

// ════════════════════════════════════════════════════════════════════════════════
// TRANSPORT TRAIT
// ════════════════════════════════════════════════════════════════════════════════

/// Async transport abstraction for node interaction.
///
/// ## Contract
///
/// - Implementations MUST NOT modify call data.
/// - Implementations MUST NOT retry internally.
/// - Implementations MUST NOT panic.
/// - `call` returns the raw return bytes; empty bytes are passed through.
#[async_trait]
pub trait ChainTransport: Send + Sync {
    /// Node / client identity string.
    async fn client_version(&self) -> Result<String, TransportError>;

    /// Executes a read-only call against latest state.
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, TransportError>;

    /// Signs `request` with `signer`, submits it, and waits until mined.
    async fn send_transaction(
        &self,
        signer: &Credential,
        request: &TransactionRequest,
    ) -> Result<Receipt, TransportError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// MOCK TRANSPORT
// ════════════════════════════════════════════════════════════════════════════════

/// A send observed by [`MockChainTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTransaction {
    /// Address derived from the signing credential.
    pub from: Address,
    pub request: TransactionRequest,
}

#[derive(Default)]
struct MockState {
    client_version: Option<String>,
    /// Keyed by the exact call data.
    calls: HashMap<Vec<u8>, Result<Vec<u8>, TransportError>>,
    call_log: Vec<CallRequest>,
    receipts: VecDeque<Result<Receipt, TransportError>>,
    sent: Vec<SentTransaction>,
}

/// Mock transport for testing without a node.
///
/// - Read calls are answered from a table keyed by exact call data. An
///   unscripted call fails with `TransportError::Rpc` ("execution
///   reverted"), like reading past the end of a contract array.
/// - Sends consume pre-loaded receipts in FIFO order. When none remain,
///   the send fails with `TransportError::Network("no mock receipt")`.
/// - Every send is recorded, including failed ones.
pub struct MockChainTransport {
    state: Mutex<MockState>,
}

impl MockChainTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn set_client_version(&self, version: impl Into<String>) {
        self.state.lock().client_version = Some(version.into());
    }

    /// Scripts the return bytes for a call with exactly this data.
    pub fn set_call_response(&self, data: Vec<u8>, output: Vec<u8>) {
        self.state.lock().calls.insert(data, Ok(output));
    }

    /// Scripts a failure for a call with exactly this data.
    pub fn set_call_error(&self, data: Vec<u8>, error: TransportError) {
        self.state.lock().calls.insert(data, Err(error));
    }

    /// Pushes a receipt to the end of the send queue.
    pub fn push_receipt(&self, receipt: Receipt) {
        self.state.lock().receipts.push_back(Ok(receipt));
    }

    /// Pushes a send failure to the end of the send queue.
    pub fn push_send_error(&self, error: TransportError) {
        self.state.lock().receipts.push_back(Err(error));
    }

    pub fn sent_transactions(&self) -> Vec<SentTransaction> {
        self.state.lock().sent.clone()
    }

    pub fn send_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    pub fn calls(&self) -> Vec<CallRequest> {
        self.state.lock().call_log.clone()
    }
}

impl Default for MockChainTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainTransport for MockChainTransport {
    async fn client_version(&self) -> Result<String, TransportError> {
        self.state
            .lock()
            .client_version
            .clone()
            .ok_or_else(|| TransportError::Network("no mock client version".to_string()))
    }

    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock();
        state.call_log.push(request.clone());
        match state.calls.get(&request.data) {
            Some(scripted) => scripted.clone(),
            None => Err(TransportError::Rpc {
                code: 3,
                message: "execution reverted".to_string(),
            }),
        }
    }

    async fn send_transaction(
        &self,
        signer: &Credential,
        request: &TransactionRequest,
    ) -> Result<Receipt, TransportError> {
        let mut state = self.state.lock();
        state.sent.push(SentTransaction {
            from: signer.address(),
            request: request.clone(),
        });
        // FIFO: remove from front.
        state
            .receipts
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no mock receipt".to_string())))
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// COMPILE-TIME ASSERTIONS
// ════════════════════════════════════════════════════════════════════════════════

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() { assert_send_sync::<MockChainTransport>(); }
    let _ = check;
};

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════
