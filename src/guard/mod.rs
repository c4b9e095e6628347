//! Wallet/chain guard.
//!
//! Every write goes through [`ChainGuard::ensure`]: no bet, approval or claim
//! is attempted unless a wallet is connected on the market's chain.

use crate::errors::{BetError, ErrorKind};
use crate::onchain::client::{ChainError, Wallet};
use alloy::primitives::Address;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardStatus {
    Ok,
    WrongChain { expected: u64, actual: u64 },
    Disconnected,
}

impl GuardStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, GuardStatus::Ok)
    }
}

pub struct ChainGuard {
    wallet: Arc<dyn Wallet>,
    market_chain: u64,
}

impl ChainGuard {
    pub fn new(wallet: Arc<dyn Wallet>, market_chain: u64) -> Self {
        Self {
            wallet,
            market_chain,
        }
    }

    pub fn market_chain(&self) -> u64 {
        self.market_chain
    }

    pub async fn check(&self) -> GuardStatus {
        if self.wallet.address().is_none() {
            return GuardStatus::Disconnected;
        }
        match self.wallet.chain_id().await {
            Ok(actual) if actual == self.market_chain => GuardStatus::Ok,
            Ok(actual) => GuardStatus::WrongChain {
                expected: self.market_chain,
                actual,
            },
            Err(e) => {
                warn!(error = %e, "could not read wallet chain id");
                GuardStatus::Disconnected
            }
        }
    }

    /// The connected account, or the reason writes are blocked.
    pub async fn ensure(&self) -> Result<Address, BetError> {
        match self.check().await {
            GuardStatus::Ok => self.wallet.address().ok_or(BetError::Disconnected),
            GuardStatus::WrongChain { expected, actual } => {
                Err(BetError::WrongChain { expected, actual })
            }
            GuardStatus::Disconnected => Err(BetError::Disconnected),
        }
    }

    pub async fn request_connect(&self) -> Result<Address, BetError> {
        let address = self.wallet.connect().await.map_err(|e| {
            warn!(raw = %e.raw(), "wallet connect failed");
            BetError::from(e)
        })?;
        info!(address = %address, "wallet connected");
        Ok(address)
    }

    /// Ask the wallet to move to the market's chain.
    ///
    /// A rejection or failure leaves the wallet where it was.
    pub async fn request_switch(&self) -> Result<(), BetError> {
        match self.check().await {
            GuardStatus::Ok => return Ok(()),
            GuardStatus::Disconnected => return Err(BetError::Disconnected),
            GuardStatus::WrongChain { .. } => {}
        }

        match self.wallet.switch_chain(self.market_chain).await {
            Ok(()) => {
                info!(chain = self.market_chain, "wallet switched chain");
                Ok(())
            }
            Err(e) => {
                warn!(chain = self.market_chain, raw = %e.raw(), "chain switch failed");
                Err(switch_error(e))
            }
        }
    }
}

fn switch_error(err: ChainError) -> BetError {
    if let ChainError::Provider(p) = &err {
        if ErrorKind::detect(&p.to_value()) == ErrorKind::UserRejected {
            return BetError::UserRejected;
        }
    }
    BetError::SwitchFailed(crate::errors::classify(&err.raw()))
}
