//! Contract ABI bindings for the bet contract and its staking tokens.
//!
//! Only the calls and events the betting flow touches are declared. Event
//! topic hashes come from the generated `SolEvent::SIGNATURE_HASH`.

use alloy::primitives::{Address, U256};
use alloy::rpc::types::Log;
use alloy::sol;

use crate::onchain::types::{Market, Position, Side};

sol! {
    #[sol(rpc)]
    interface IOpinionBet {
        struct EventInfo {
            address token;
            uint64 startTime;
            uint64 endTime;
            bool settled;
            uint8 winningChoice;
            uint256 totalAmount;
            uint256 yesAmount;
            uint256 noAmount;
        }

        struct UserBet {
            uint8 choice;
            uint256 amount;
            bool claimed;
        }

        event BetPlaced(uint256 indexed eventId, address indexed user, uint8 choice, uint256 amount);
        event Claimed(uint256 indexed eventId, address indexed user, uint256 amount);

        function getEvent(uint256 eventId) external view returns (EventInfo memory info);
        function getUserBet(uint256 eventId, address user) external view returns (UserBet memory bet);
        function claimable(uint256 eventId, address user) external view returns (uint256 amount);
        function owner() external view returns (address);

        function doBet(uint256 eventId, uint256 amount, uint8 choice) external payable;
        function claim(uint256 eventId) external;
    }
}

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// Convert the contract's event struct into a [`Market`].
///
/// The chain id is not stored on-chain; it comes from the market's configuration.
pub fn market_from_info(id: U256, chain_id: u64, info: &IOpinionBet::EventInfo) -> Market {
    Market {
        id,
        chain_id,
        token: info.token,
        start_time: info.startTime,
        end_time: info.endTime,
        settled: info.settled,
        winning_side: if info.settled {
            Side::from_code(info.winningChoice)
        } else {
            None
        },
        total_staked: info.totalAmount,
        staked_yes: info.yesAmount,
        staked_no: info.noAmount,
    }
}

pub fn position_from_bet(bet: &IOpinionBet::UserBet) -> Position {
    Position {
        side: Side::from_code(bet.choice),
        amount: bet.amount,
        claimed: bet.claimed,
    }
}

/// Find the payout of a `Claimed` event for `(market_id, user)` among receipt logs.
pub fn decode_claimed_amount(
    logs: &[Log],
    contract: Address,
    market_id: U256,
    user: Address,
) -> Option<U256> {
    logs.iter()
        .filter(|log| log.address() == contract)
        .filter_map(|log| log.log_decode::<IOpinionBet::Claimed>().ok())
        .map(|decoded| decoded.inner.data)
        .find(|event| event.eventId == market_id && event.user == user)
        .map(|event| event.amount)
}
