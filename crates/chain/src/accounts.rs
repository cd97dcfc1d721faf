//! Wallet-level operations: whitelisting at signup, burning on
//! redemption, and the balance snapshot.
//!
//! All sends here are signed by the backend credential.

use std::sync::Arc;

use recicla_common::abi::AbiValue;
use recicla_common::crypto::{keccak256_hex_str, Credential};
use recicla_common::result::TransactionResult;
use recicla_common::types::{Address, BalanceSnapshot};
use recicla_common::units::{from_base_units, to_base_units};
use tracing::{error, info};

use crate::client::{ClientError, ContractClient};
use crate::contract::{ADD_TO_WHITELIST, BALANCE_OF, BURN_FOR_REDEMPTION, IS_WHITELISTED, TOTAL_EARNED, TOTAL_SPENT};

pub struct AccountService {
    client: ContractClient,
    backend: Arc<Credential>,
}

impl AccountService {
    pub fn new(client: ContractClient, backend: Arc<Credential>) -> Self {
        Self { client, backend }
    }

    /// Whitelists `wallet`. Only the keccak-256 of the national id goes on
    /// chain.
    pub async fn register_user_on_chain(&self, wallet: &Address, national_id: &str) -> TransactionResult {
        info!(wallet = %wallet, "registering user on chain");
        let args = [
            AbiValue::Address(*wallet),
            AbiValue::String(keccak256_hex_str(national_id)),
        ];
        match self.client.send_and_wait(&self.backend, &ADD_TO_WHITELIST, &args).await {
            Ok(receipt) => {
                info!(wallet = %wallet, tx_hash = %receipt.transaction_hash, "user registered");
                TransactionResult::success(receipt.transaction_hash, receipt.block_number)
            }
            Err(e) => {
                error!(wallet = %wallet, error = %e, "user registration failed");
                TransactionResult::from_error(&e)
            }
        }
    }

    /// Burns `amount` tokens (decimal string) from `wallet`. A negative or
    /// malformed amount fails without sending anything.
    pub async fn burn_for_redemption(
        &self,
        wallet: &Address,
        amount: &str,
        description: &str,
    ) -> TransactionResult {
        let base_units = match to_base_units(amount) {
            Ok(v) => v,
            Err(e) => {
                error!(wallet = %wallet, amount, error = %e, "burn rejected");
                return TransactionResult::from_error(&e);
            }
        };
        info!(wallet = %wallet, amount = %from_base_units(base_units), "burning tokens for redemption");

        let args = [
            AbiValue::Address(*wallet),
            AbiValue::Uint(base_units),
            AbiValue::String(description.to_string()),
        ];
        match self.client.send_and_wait(&self.backend, &BURN_FOR_REDEMPTION, &args).await {
            Ok(receipt) => {
                info!(wallet = %wallet, tx_hash = %receipt.transaction_hash, "tokens burned");
                TransactionResult::success(receipt.transaction_hash, receipt.block_number)
            }
            Err(e) => {
                error!(wallet = %wallet, error = %e, "burn failed");
                TransactionResult::from_error(&e)
            }
        }
    }

    /// Four independent reads. Any failure makes the whole snapshot
    /// absent.
    pub async fn get_user_balance(&self, wallet: &Address) -> Option<BalanceSnapshot> {
        match self.read_balance(wallet).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!(wallet = %wallet, error = %e, "balance read failed");
                None
            }
        }
    }

    async fn read_balance(&self, wallet: &Address) -> Result<BalanceSnapshot, ClientError> {
        let who = [AbiValue::Address(*wallet)];
        let current = self.client.read_uint(&BALANCE_OF, &who).await?;
        let earned = self.client.read_uint(&TOTAL_EARNED, &who).await?;
        let spent = self.client.read_uint(&TOTAL_SPENT, &who).await?;
        let is_whitelisted = self.client.read_bool(&IS_WHITELISTED, &who).await?;
        Ok(BalanceSnapshot {
            current_balance: from_base_units(current),
            total_earned: from_base_units(earned),
            total_spent: from_base_units(spent),
            is_whitelisted,
        })
    }
}
