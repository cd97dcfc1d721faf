//! # Recicla Chain Library
//!
//! Client side of the recycling-rewards token contract.
//!
//! ## Module Overview
//!
//! | Module | Role |
//! |--------|------|
//! | `transport` | `ChainTransport` seam, `MockChainTransport` |
//! | `rpc` | alloy-backed JSON-RPC transport: calls, signed sends, receipt polling |
//! | `contract` | Function descriptors and activity field layouts |
//! | `client` | `ContractClient`: send-and-wait, typed read, raw read |
//! | `orchestrator` | Propose / approve / reject / enumerate activities |
//! | `accounts` | Whitelisting, redemption burns, balance snapshot |
//! | `evidence` | `EvidenceStore` trait and the Pinata implementation |
//! | `integration` | Optional capabilities and degraded behaviour |
//!
//! ## Data Flow
//!
//! ```text
//! caller ──► ActivityOrchestrator / AccountService
//!                 │
//!                 ▼
//!           ContractClient ──(abi encode)──► dyn ChainTransport ──► node
//!                 ▲                                  │
//!                 └────────(abi decode)──────────────┘
//! ```

pub mod accounts;
pub mod client;
pub mod contract;
pub mod evidence;
pub mod integration;
pub mod orchestrator;
pub mod rpc;
pub mod transport;

pub use accounts::AccountService;
pub use client::{ClientError, ContractClient, GasSettings};
pub use evidence::{EvidenceError, EvidenceFile, EvidenceStore, PinataEvidenceStore};
pub use integration::{
    ActivityRequest, ActivitySubmission, ChainService, ChainWrite, Integration, RegistrationError,
    SetupError,
};
pub use orchestrator::ActivityOrchestrator;
pub use rpc::{JsonRpcConfig, JsonRpcTransport};
pub use transport::{
    CallRequest, ChainTransport, MockChainTransport, Receipt, SentTransaction, TransactionRequest,
    TransportError,
};
