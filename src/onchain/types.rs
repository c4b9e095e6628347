//! Market, position and receipt types read from the bet contract.

use alloy::primitives::{Address, B256, I256, U256};
use alloy::rpc::types::Log;
use serde::Serialize;

/// Transaction hash as returned by `eth_sendTransaction`.
pub type TxHash = B256;

/// Outcome side of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// On-chain choice code. `0` is reserved for "none".
    pub fn code(self) -> u8 {
        match self {
            Side::Yes => 1,
            Side::No => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Side> {
        match code {
            1 => Some(Side::Yes),
            2 => Some(Side::No),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Yes => "YES",
            Side::No => "NO",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" | "y" => Ok(Side::Yes),
            "no" | "n" => Ok(Side::No),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// A single yes/no market ("event" on the contract).
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub id: U256,
    pub chain_id: u64,
    /// Staking token. `Address::ZERO` means the chain's native currency.
    pub token: Address,
    pub start_time: u64,
    pub end_time: u64,
    pub settled: bool,
    pub winning_side: Option<Side>,
    pub total_staked: U256,
    pub staked_yes: U256,
    pub staked_no: U256,
}

impl Market {
    pub fn is_native(&self) -> bool {
        self.token == Address::ZERO
    }

    pub fn has_ended(&self, now: u64) -> bool {
        self.end_time != 0 && now >= self.end_time
    }

    pub fn has_started(&self, now: u64) -> bool {
        now >= self.start_time
    }

    pub fn staked_on(&self, side: Side) -> U256 {
        match side {
            Side::Yes => self.staked_yes,
            Side::No => self.staked_no,
        }
    }
}

/// A wallet's stake within one market.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Position {
    pub side: Option<Side>,
    pub amount: U256,
    pub claimed: bool,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.amount > U256::ZERO
    }
}

/// Token metadata needed to convert user input into base units.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenInfo {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    pub native: bool,
}

/// Settlement-derived view of a position.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    NoPosition,
    Open { side: Side, amount: U256 },
    Won { claimable: U256, pnl: I256 },
    /// Losing side after settlement ("position liquidated").
    Lost { pnl: I256 },
    Claimed,
}

/// Minimal receipt summary the state machines act on.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub logs: Vec<Log>,
}

/// Saturating conversion used for PnL arithmetic.
pub fn to_signed(value: U256) -> I256 {
    I256::try_from(value).unwrap_or(I256::MAX)
}
