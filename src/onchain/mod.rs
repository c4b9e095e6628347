//! Chain access for the betting flow.
//!
//! - `client`: the `Wallet` / `BetContract` traits the state machines use
//! - `rpc`: alloy HTTP implementation of both
//! - `abi`: `sol!` bindings and decoding helpers
//! - `types`, `units`: market/position types and amount conversion

pub mod abi;
pub mod client;
#[cfg(test)]
pub(crate) mod mock;
pub mod rpc;
pub mod types;
pub mod units;

pub use client::{BetContract, ChainError, Wallet};
pub use rpc::{RpcContract, RpcWallet};
pub use types::{Market, Outcome, Position, Side, TokenInfo, TxHash};
