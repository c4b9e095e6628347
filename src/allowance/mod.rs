//! ERC-20 allowance tracking for the bet contract.
//!
//! Allowance reads are cached per (owner, token) and dropped whenever an
//! approval or bet transaction settles, or a bet reverts. Native-currency
//! markets never need one.

use crate::errors::BetError;
use crate::onchain::client::BetContract;
use crate::onchain::types::TxHash;
use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Approval ceiling. Approving the maximum once avoids an approval per bet.
pub const APPROVAL_CEILING: U256 = U256::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowanceStatus {
    Sufficient,
    Insufficient,
}

pub struct AllowanceManager {
    contract: Arc<dyn BetContract>,
    /// (owner, token) → allowance granted to the bet contract
    cache: DashMap<(Address, Address), U256>,
    receipt_timeout: Duration,
}

impl AllowanceManager {
    pub fn new(contract: Arc<dyn BetContract>, receipt_timeout: Duration) -> Self {
        Self {
            contract,
            cache: DashMap::new(),
            receipt_timeout,
        }
    }

    pub fn spender(&self) -> Address {
        self.contract.address()
    }

    pub async fn check(
        &self,
        owner: Address,
        token: Address,
        amount: U256,
    ) -> Result<AllowanceStatus, BetError> {
        if token == Address::ZERO {
            return Ok(AllowanceStatus::Sufficient);
        }

        let current = self.current(owner, token).await?;
        if current >= amount {
            Ok(AllowanceStatus::Sufficient)
        } else {
            debug!(
                owner = %owner,
                token = %token,
                allowance = %current,
                needed = %amount,
                "allowance insufficient"
            );
            Ok(AllowanceStatus::Insufficient)
        }
    }

    async fn current(&self, owner: Address, token: Address) -> Result<U256, BetError> {
        if let Some(cached) = self.cache.get(&(owner, token)) {
            return Ok(*cached);
        }
        let value = self
            .contract
            .allowance(token, owner, self.spender())
            .await?;
        self.cache.insert((owner, token), value);
        Ok(value)
    }

    pub fn invalidate(&self, owner: Address, token: Address) {
        self.cache.remove(&(owner, token));
    }

    /// Submit an approval for [`APPROVAL_CEILING`] and wait for its receipt.
    ///
    /// Returns `None` for native-currency markets, where nothing is sent.
    pub async fn request_approval(
        &self,
        owner: Address,
        token: Address,
    ) -> Result<Option<TxHash>, BetError> {
        if token == Address::ZERO {
            debug!("native asset, approval not required");
            return Ok(None);
        }

        let tx_hash = self
            .contract
            .approve(token, self.spender(), APPROVAL_CEILING)
            .await
            .map_err(|e| {
                warn!(token = %token, raw = %e.raw(), "approval submission failed");
                BetError::from(e)
            })?;

        info!(token = %token, tx = %tx_hash, "approval submitted");

        let receipt = self
            .contract
            .wait_for_receipt(tx_hash, self.receipt_timeout)
            .await;
        // Whatever happened on-chain, the cached value is stale now.
        self.invalidate(owner, token);

        let receipt = receipt.map_err(|e| {
            warn!(tx = %tx_hash, raw = %e.raw(), "approval receipt wait failed");
            BetError::from(e)
        })?;

        if !receipt.success {
            warn!(tx = %tx_hash, "approval reverted");
            return Err(BetError::Reverted("approval transaction reverted".to_string()));
        }

        info!(token = %token, tx = %tx_hash, "approval confirmed");
        Ok(Some(tx_hash))
    }
}
