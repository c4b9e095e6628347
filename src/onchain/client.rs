//! Wallet and contract seams.
//!
//! The state machines only talk to the chain through these two traits. The
//! alloy-backed implementation lives in `rpc`; tests use `mock::MockChain`.

use crate::onchain::types::{Market, Position, Side, TokenInfo, TxHash, TxReceipt};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC style error as reported by a wallet or node.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderError {
    /// EIP-1193 / JSON-RPC code, e.g. `4001` for a rejected request.
    pub code: Option<i64>,
    pub message: String,
    pub data: Option<Value>,
}

impl ProviderError {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// The error in the JSON shape wallets hand to front ends.
    pub fn to_value(&self) -> Value {
        let mut obj = serde_json::Map::new();
        if let Some(code) = self.code {
            obj.insert("code".to_string(), Value::from(code));
        }
        obj.insert("message".to_string(), Value::from(self.message.clone()));
        if let Some(data) = &self.data {
            obj.insert("data".to_string(), data.clone());
        }
        Value::Object(obj)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("provider error: {}", .0.message)]
    Provider(ProviderError),
    #[error("timed out waiting for receipt of {0}")]
    ReceiptTimeout(TxHash),
    #[error("wallet not connected")]
    NotConnected,
    #[error("no RPC endpoint configured for chain {0}")]
    UnknownChain(u64),
    #[error("transport: {0}")]
    Transport(String),
    #[error("invalid signer key: {0}")]
    Signer(String),
}

impl ChainError {
    /// Raw error payload for diagnostics and classification.
    pub fn raw(&self) -> Value {
        match self {
            ChainError::Provider(p) => p.to_value(),
            other => Value::String(other.to_string()),
        }
    }
}

/// Wallet connector: account, active chain, chain switching.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Connect (or re-connect) and return the active account.
    async fn connect(&self) -> Result<Address, ChainError>;

    /// Currently connected account, if any.
    fn address(&self) -> Option<Address>;

    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ChainError>;
}

/// The bet contract deployment a market lives on, plus its staking tokens.
///
/// Reads go to the deployment's chain. Writes are signed by the wallet and
/// sent on whatever chain the wallet is on, so callers must run the chain
/// guard first.
#[async_trait]
pub trait BetContract: Send + Sync {
    /// Contract address, also the ERC-20 spender.
    fn address(&self) -> Address;

    /// Chain the contract is deployed on.
    fn chain_id(&self) -> u64;

    async fn market(&self, market_id: U256) -> Result<Market, ChainError>;

    async fn position(&self, market_id: U256, user: Address) -> Result<Position, ChainError>;

    async fn claimable(&self, market_id: U256, user: Address) -> Result<U256, ChainError>;

    async fn owner(&self) -> Result<Address, ChainError>;

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ChainError>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    /// Token balance, or the native balance when `token` is zero.
    async fn balance(&self, token: Address, owner: Address) -> Result<U256, ChainError>;

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError>;

    async fn place_bet(
        &self,
        market_id: U256,
        amount: U256,
        side: Side,
        value: U256,
    ) -> Result<TxHash, ChainError>;

    async fn claim(&self, market_id: U256) -> Result<TxHash, ChainError>;

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError>;
}
