//! Pre-submission checks for a bet.

use crate::errors::{BetError, ValidationError};
use crate::onchain::types::{Market, Position, Side, TokenInfo};
use alloy::primitives::U256;

/// Reject a bet that the contract would refuse or the user cannot afford.
///
/// Switching sides while a position is open is refused here so no
/// transaction is ever sent for it.
pub fn validate_bet(
    market: &Market,
    position: &Position,
    side: Side,
    amount: U256,
    balance: U256,
    token: &TokenInfo,
    now: u64,
) -> Result<(), BetError> {
    if market.settled {
        return Err(ValidationError::MarketSettled.into());
    }
    if market.has_ended(now) {
        return Err(ValidationError::MarketEnded.into());
    }
    if !market.has_started(now) {
        return Err(ValidationError::MarketNotStarted.into());
    }
    if amount == U256::ZERO {
        return Err(ValidationError::ZeroAmount.into());
    }
    if position.is_open() {
        if let Some(held) = position.side {
            if held != side {
                return Err(ValidationError::SideLocked {
                    held,
                    requested: side,
                }
                .into());
            }
        }
    }
    if balance < amount {
        return Err(BetError::InsufficientBalance {
            needed: amount,
            available: balance,
            decimals: token.decimals,
            symbol: token.symbol.clone(),
        });
    }
    Ok(())
}
