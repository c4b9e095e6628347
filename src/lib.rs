//! Betting client for opinion markets.
//!
//! One [`panel::BetPanel`] drives a single market: wallet/chain guard,
//! ERC-20 allowance, bet and claim transactions, settlement reads and
//! off-chain callbacks. The `opinion` binary is a thin CLI over it.

pub mod allowance;
pub mod bet;
pub mod callback;
pub mod claim;
pub mod config;
pub mod errors;
pub mod guard;
pub mod onchain;
pub mod panel;
pub mod session;
pub mod settlement;
