//! Error taxonomy for the betting flow.
//!
//! Every failure a user can hit maps onto [`BetError`]. Its `Display` output
//! is the message shown in the toast; raw provider payloads are logged by the
//! caller and never shown.

pub mod classify;

pub use classify::{classify, ErrorKind, UNKNOWN_ERROR};

use crate::onchain::client::ChainError;
use crate::onchain::types::{Side, TxHash};
use crate::onchain::units::format_amount;
use alloy::primitives::U256;
use thiserror::Error;
use tracing::warn;

/// Rejections raised before anything is sent to the wallet.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("amount must be greater than zero")]
    ZeroAmount,
    #[error("amount has more than {0} decimal places")]
    TooPrecise(u8),
    #[error("market has already been settled")]
    MarketSettled,
    #[error("market has not started yet")]
    MarketNotStarted,
    #[error("market has ended")]
    MarketEnded,
    #[error("you already hold a {held} position; wait for settlement before betting {requested}")]
    SideLocked { held: Side, requested: Side },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BetError {
    #[error("wallet not connected")]
    Disconnected,
    #[error("wrong network: market is on chain {expected}, wallet is on chain {actual}")]
    WrongChain { expected: u64, actual: u64 },
    #[error("network switch failed: {0}")]
    SwitchFailed(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(
        "insufficient balance: need {} {symbol}, have {} {symbol}",
        format_amount(*.needed, *.decimals),
        format_amount(*.available, *.decimals)
    )]
    InsufficientBalance {
        needed: U256,
        available: U256,
        decimals: u8,
        symbol: String,
    },
    #[error("token approval required")]
    InsufficientAllowance,
    #[error("transaction rejected in wallet")]
    UserRejected,
    #[error("insufficient funds for transaction")]
    InsufficientFunds,
    #[error("{0}")]
    Reverted(String),
    #[error("transaction {0} was not confirmed in time")]
    ReceiptTimeout(TxHash),
    #[error("{0}")]
    Rpc(String),
    #[error("{0} already in progress")]
    Busy(&'static str),
    #[error("nothing to claim")]
    NotEligible,
}

impl From<ChainError> for BetError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::NotConnected => BetError::Disconnected,
            ChainError::ReceiptTimeout(hash) => BetError::ReceiptTimeout(hash),
            other => {
                let raw = other.raw();
                let message = classify(&raw);
                match ErrorKind::detect(&raw) {
                    ErrorKind::UserRejected => BetError::UserRejected,
                    ErrorKind::InsufficientFunds => BetError::InsufficientFunds,
                    ErrorKind::Reverted => BetError::Reverted(message),
                    ErrorKind::Other => BetError::Rpc(message),
                }
            }
        }
    }
}

/// Map a chain error, logging the raw payload the user never sees.
pub fn logged(context: &'static str) -> impl Fn(ChainError) -> BetError {
    move |err| {
        warn!(raw = %err.raw(), "{} failed", context);
        BetError::from(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::client::ProviderError;

    #[test]
    fn test_chain_error_mapping() {
        let rejected = ChainError::Provider(ProviderError::new(Some(4001), "User denied transaction signature"));
        assert_eq!(BetError::from(rejected), BetError::UserRejected);

        let revert = ChainError::Provider(ProviderError::new(
            Some(3),
            "execution reverted: Event ended",
        ));
        assert_eq!(BetError::from(revert), BetError::Reverted("Event ended".to_string()));

        let transport = ChainError::Transport("connection reset by peer".to_string());
        assert_eq!(
            BetError::from(transport),
            BetError::Rpc("transport: connection reset by peer".to_string())
        );

        assert_eq!(BetError::from(ChainError::NotConnected), BetError::Disconnected);
    }

    #[test]
    fn test_messages_are_user_facing() {
        let err = BetError::from(ValidationError::SideLocked {
            held: Side::Yes,
            requested: Side::No,
        });
        assert_eq!(
            err.to_string(),
            "you already hold a YES position; wait for settlement before betting NO"
        );

        let err = BetError::InsufficientBalance {
            needed: U256::from(1_500_000_000_000_000_000u64),
            available: U256::from(250_000_000_000_000_000u64),
            decimals: 18,
            symbol: "ETH".to_string(),
        };
        assert_eq!(err.to_string(), "insufficient balance: need 1.5 ETH, have 0.25 ETH");
    }
}
