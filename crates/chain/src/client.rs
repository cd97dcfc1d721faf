//! # ContractClient
//!
//! Three call shapes against one contract address:
//!
//! - **send-and-wait**: encode, sign with the given credential, submit,
//!   resolve once mined.
//! - **typed read**: encode, `eth_call` at latest, decode the declared
//!   outputs. Empty return data is a decode failure here.
//! - **raw read**: same call path, but empty return data is "no data"
//!   and yields an empty value list instead of an error. Used for the
//!   public-array getter and the public counter.
//!
//! The signer decides who pays and whose authority the call carries; the
//! client never chooses one itself.

use std::sync::Arc;

use recicla_common::abi::{AbiError, AbiValue, FunctionDescriptor};
use recicla_common::config::BlockchainConfig;
use recicla_common::crypto::Credential;
use recicla_common::types::Address;
use thiserror::Error;
use tracing::debug;

use crate::transport::{CallRequest, ChainTransport, Receipt, TransactionRequest, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    TransactionFailed(TransportError),

    #[error("call to {function} failed: {source}")]
    CallFailed {
        function: &'static str,
        source: TransportError,
    },

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error("{function} returned {found} values, expected {expected}")]
    UnexpectedShape {
        function: &'static str,
        found: usize,
        expected: usize,
    },
}

/// Gas settings applied to every send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasSettings {
    pub gas_price: u64,
    pub gas_limit: u64,
}

impl From<&BlockchainConfig> for GasSettings {
    fn from(cfg: &BlockchainConfig) -> Self {
        Self {
            gas_price: cfg.gas_price,
            gas_limit: cfg.gas_limit,
        }
    }
}

#[derive(Clone)]
pub struct ContractClient {
    transport: Arc<dyn ChainTransport>,
    contract: Address,
    gas: GasSettings,
}

impl std::fmt::Debug for ContractClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractClient")
            .field("contract", &self.contract)
            .field("gas", &self.gas)
            .finish()
    }
}

impl ContractClient {
    pub fn new(transport: Arc<dyn ChainTransport>, contract: Address, gas: GasSettings) -> Self {
        Self { transport, contract, gas }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub async fn client_version(&self) -> Result<String, TransportError> {
        self.transport.client_version().await
    }

    /// Submits a state-changing call signed by `signer` and waits until
    /// it is mined.
    pub async fn send_and_wait(
        &self,
        signer: &Credential,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<Receipt, ClientError> {
        let data = function.encode_call(args)?;
        let request = TransactionRequest {
            to: self.contract,
            data,
            gas_limit: self.gas.gas_limit,
            gas_price: self.gas.gas_price,
        };
        debug!(function = function.name, from = %signer.address(), "sending transaction");
        self.transport
            .send_transaction(signer, &request)
            .await
            .map_err(ClientError::TransactionFailed)
    }

    async fn call_bytes(
        &self,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<Vec<u8>, ClientError> {
        let data = function.encode_call(args)?;
        self.transport
            .call(&CallRequest { to: self.contract, data })
            .await
            .map_err(|source| ClientError::CallFailed { function: function.name, source })
    }

    /// Read-only call decoded against the declared outputs.
    pub async fn typed_read(
        &self,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<Vec<AbiValue>, ClientError> {
        let bytes = self.call_bytes(function, args).await?;
        Ok(function.decode_output(&bytes)?)
    }

    /// Typed read of a function with exactly one output.
    pub async fn read_single(
        &self,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<AbiValue, ClientError> {
        let mut values = self.typed_read(function, args).await?;
        if values.len() != 1 {
            return Err(ClientError::UnexpectedShape {
                function: function.name,
                found: values.len(),
                expected: 1,
            });
        }
        Ok(values.remove(0))
    }

    pub async fn read_uint(
        &self,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<u128, ClientError> {
        let value = self.read_single(function, args).await?;
        value.as_uint().ok_or(ClientError::UnexpectedShape {
            function: function.name,
            found: 0,
            expected: 1,
        })
    }

    pub async fn read_bool(
        &self,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<bool, ClientError> {
        let value = self.read_single(function, args).await?;
        value.as_bool().ok_or(ClientError::UnexpectedShape {
            function: function.name,
            found: 0,
            expected: 1,
        })
    }

    /// Read-only call through the codec directly. Empty return data
    /// yields an empty list.
    pub async fn raw_read(
        &self,
        function: &FunctionDescriptor,
        args: &[AbiValue],
    ) -> Result<Vec<AbiValue>, ClientError> {
        let bytes = self.call_bytes(function, args).await?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(function.decode_output(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{ACTIVITY_COUNTER, APPROVE_ACTIVITY, BALANCE_OF, IS_WHITELISTED};
    use crate::transport::MockChainTransport;
    use recicla_common::abi::encode_params;
    use recicla_common::abi::AbiType;
    use recicla_common::types::TxHash;

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn setup() -> (Arc<MockChainTransport>, ContractClient) {
        let mock = Arc::new(MockChainTransport::new());
        let client = ContractClient::new(
            mock.clone(),
            Address::from_bytes([0xC0; 20]),
            GasSettings { gas_price: 7, gas_limit: 300_000 },
        );
        (mock, client)
    }

    fn uint_out(v: u128) -> Vec<u8> {
        encode_params(&[AbiType::Uint256], &[AbiValue::Uint(v)]).unwrap()
    }

    #[tokio::test]
    async fn send_and_wait_uses_signer_and_gas() {
        let (mock, client) = setup();
        mock.push_receipt(Receipt { transaction_hash: TxHash::from_bytes([1; 32]), block_number: Some(4) });
        let signer = Credential::from_private_key_hex(DEV_KEY).unwrap();

        let receipt = client
            .send_and_wait(&signer, &APPROVE_ACTIVITY, &[AbiValue::Uint(5)])
            .await
            .unwrap();
        assert_eq!(receipt.block_number, Some(4));

        let sent = mock.sent_transactions();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, signer.address());
        assert_eq!(sent[0].request.to, client.contract());
        assert_eq!(sent[0].request.gas_price, 7);
        assert_eq!(sent[0].request.gas_limit, 300_000);
        assert_eq!(
            sent[0].request.data,
            APPROVE_ACTIVITY.encode_call(&[AbiValue::Uint(5)]).unwrap()
        );
    }

    #[tokio::test]
    async fn send_failure_keeps_message() {
        let (mock, client) = setup();
        mock.push_send_error(TransportError::Rpc { code: 3, message: "execution reverted: ya votaste".into() });
        let signer = Credential::from_private_key_hex(DEV_KEY).unwrap();
        let err = client
            .send_and_wait(&signer, &APPROVE_ACTIVITY, &[AbiValue::Uint(5)])
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::TransactionFailed(_)));
        assert!(err.to_string().contains("execution reverted: ya votaste"));
    }

    #[tokio::test]
    async fn encode_error_sends_nothing() {
        let (mock, client) = setup();
        let signer = Credential::from_private_key_hex(DEV_KEY).unwrap();
        let err = client.send_and_wait(&signer, &APPROVE_ACTIVITY, &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Abi(AbiError::Encode(_))));
        assert_eq!(mock.send_count(), 0);
    }

    #[tokio::test]
    async fn typed_reads() {
        let (mock, client) = setup();
        let who = AbiValue::Address(Address::from_bytes([0x0A; 20]));
        mock.set_call_response(BALANCE_OF.encode_call(&[who.clone()]).unwrap(), uint_out(42));
        mock.set_call_response(
            IS_WHITELISTED.encode_call(&[who.clone()]).unwrap(),
            encode_params(&[AbiType::Bool], &[AbiValue::Bool(true)]).unwrap(),
        );
        assert_eq!(client.read_uint(&BALANCE_OF, &[who.clone()]).await.unwrap(), 42);
        assert!(client.read_bool(&IS_WHITELISTED, &[who]).await.unwrap());
    }

    #[tokio::test]
    async fn empty_data_typed_vs_raw() {
        let (mock, client) = setup();
        mock.set_call_response(ACTIVITY_COUNTER.encode_call(&[]).unwrap(), Vec::new());
        assert!(matches!(
            client.typed_read(&ACTIVITY_COUNTER, &[]).await,
            Err(ClientError::Abi(AbiError::Decode(_)))
        ));
        assert!(client.raw_read(&ACTIVITY_COUNTER, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn call_failure_names_function() {
        let (_mock, client) = setup();
        let err = client.raw_read(&ACTIVITY_COUNTER, &[]).await.unwrap_err();
        assert!(err.to_string().starts_with("call to actividadCounter failed"));
    }
}
