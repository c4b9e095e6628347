//! Settlement reader.
//!
//! Reads market, position and claimable state for one market and derives
//! the position outcome and claim eligibility from it. The last snapshot is
//! kept for the panel view; every write path re-reads before submitting.

use crate::errors::BetError;
use crate::onchain::client::BetContract;
use crate::onchain::types::{to_signed, Market, Outcome, Position, TokenInfo};
use crate::session::{PanelEvent, Session};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, warn};

/// Everything the panel needs to know about one market for one wallet.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub market: Market,
    pub token: TokenInfo,
    /// Wallet the position belongs to; `None` when read without a wallet.
    pub user: Option<Address>,
    pub position: Position,
    pub claimable: U256,
    pub balance: Option<U256>,
}

impl Snapshot {
    pub fn outcome(&self) -> Outcome {
        outcome(&self.market, &self.position, self.claimable)
    }

    pub fn claim_enabled(&self) -> bool {
        claim_enabled(&self.market, &self.position, self.claimable)
    }
}

/// Derive the outcome of a position.
pub fn outcome(market: &Market, position: &Position, claimable: U256) -> Outcome {
    if position.claimed {
        return Outcome::Claimed;
    }
    let side = match position.side {
        Some(side) if position.is_open() => side,
        _ => return Outcome::NoPosition,
    };
    if !market.settled {
        return Outcome::Open {
            side,
            amount: position.amount,
        };
    }

    let staked = to_signed(position.amount);
    let won = match market.winning_side {
        Some(winner) => winner == side,
        // Settled without a winning side: whatever is claimable is a refund.
        None => claimable > U256::ZERO,
    };

    if won {
        Outcome::Won {
            claimable,
            pnl: to_signed(claimable) - staked,
        }
    } else {
        Outcome::Lost { pnl: -staked }
    }
}

pub fn claim_enabled(market: &Market, position: &Position, claimable: U256) -> bool {
    market.settled && !position.claimed && claimable > U256::ZERO
}

pub struct SettlementReader {
    contract: Arc<dyn BetContract>,
    market_id: U256,
    token: OnceCell<TokenInfo>,
    latest: RwLock<Option<Snapshot>>,
}

impl SettlementReader {
    pub fn new(contract: Arc<dyn BetContract>, market_id: U256) -> Self {
        Self {
            contract,
            market_id,
            token: OnceCell::new(),
            latest: RwLock::new(None),
        }
    }

    pub fn market_id(&self) -> U256 {
        self.market_id
    }

    /// Fresh read of market and, if `user` is given, their position.
    pub async fn read(&self, user: Option<Address>) -> Result<Snapshot, BetError> {
        let market = self.contract.market(self.market_id).await?;
        let token = self
            .token
            .get_or_try_init(|| self.contract.token_info(market.token))
            .await?
            .clone();

        let (position, claimable, balance) = match user {
            Some(user) => {
                let (position, claimable, balance) = futures::try_join!(
                    self.contract.position(self.market_id, user),
                    self.contract.claimable(self.market_id, user),
                    self.contract.balance(market.token, user),
                )?;
                (position, claimable, Some(balance))
            }
            None => (Position::default(), U256::ZERO, None),
        };

        let snapshot = Snapshot {
            market,
            token,
            user,
            position,
            claimable,
            balance,
        };

        debug!(
            market = %self.market_id,
            settled = snapshot.market.settled,
            position = %snapshot.position.amount,
            claimable = %snapshot.claimable,
            "market snapshot refreshed"
        );

        *self.latest.write().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    pub async fn latest(&self) -> Option<Snapshot> {
        self.latest.read().await.clone()
    }

    /// Latest snapshot if it belongs to `user`, otherwise a fresh read.
    pub async fn latest_for(&self, user: Option<Address>) -> Result<Snapshot, BetError> {
        match self.latest().await {
            Some(snapshot) if snapshot.user == user => Ok(snapshot),
            _ => self.read(user).await,
        }
    }

    /// Apply a local change to the cached snapshot, e.g. after a confirmed claim.
    pub async fn update_latest(&self, f: impl FnOnce(&mut Snapshot)) {
        if let Some(snapshot) = self.latest.write().await.as_mut() {
            f(snapshot);
        }
    }

    /// Re-read after a confirmed transaction, once the node had time to index it.
    ///
    /// Failures are logged; the next explicit refresh will catch up.
    pub async fn refresh_after_confirmation(&self, session: &Session, user: Address) {
        tokio::time::sleep(session.settings.refresh_delay()).await;
        match self.read(Some(user)).await {
            Ok(_) => session.emit(PanelEvent::Refreshed {
                market_id: self.market_id,
            }),
            Err(e) => warn!(market = %self.market_id, error = %e, "post-confirmation refresh failed"),
        }
    }

    pub async fn set_balance(&self, user: Address, balance: U256) {
        self.update_latest(|s| {
            if s.user == Some(user) {
                s.balance = Some(balance);
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onchain::mock::MockChain;
    use crate::onchain::types::Side;
    use alloy::primitives::I256;

    fn market(settled: bool, winner: Option<Side>) -> Market {
        Market {
            id: U256::from(1),
            chain_id: 2,
            token: Address::ZERO,
            start_time: 0,
            end_time: 100,
            settled,
            winning_side: winner,
            total_staked: U256::from(150),
            staked_yes: U256::from(100),
            staked_no: U256::from(50),
        }
    }

    fn position(side: Side, amount: u64) -> Position {
        Position {
            side: Some(side),
            amount: U256::from(amount),
            claimed: false,
        }
    }

    #[test]
    fn test_winner_can_claim() {
        let m = market(true, Some(Side::Yes));
        let p = position(Side::Yes, 100);
        let claimable = U256::from(150);

        assert_eq!(
            outcome(&m, &p, claimable),
            Outcome::Won {
                claimable,
                pnl: I256::try_from(50i64).unwrap()
            }
        );
        assert!(claim_enabled(&m, &p, claimable));
    }

    #[test]
    fn test_loser_is_liquidated() {
        let m = market(true, Some(Side::Yes));
        let p = position(Side::No, 50);

        assert_eq!(
            outcome(&m, &p, U256::ZERO),
            Outcome::Lost {
                pnl: I256::try_from(-50i64).unwrap()
            }
        );
        assert!(!claim_enabled(&m, &p, U256::ZERO));
    }

    #[test]
    fn test_claim_disabled_states() {
        let p = position(Side::Yes, 100);
        assert!(!claim_enabled(&market(false, None), &p, U256::from(150)));

        let claimed = Position {
            claimed: true,
            ..p.clone()
        };
        let settled = market(true, Some(Side::Yes));
        assert!(!claim_enabled(&settled, &claimed, U256::from(150)));
        assert_eq!(outcome(&settled, &claimed, U256::ZERO), Outcome::Claimed);
        assert!(!claim_enabled(&settled, &p, U256::ZERO));
    }

    #[test]
    fn test_open_and_empty_positions() {
        let m = market(false, None);
        assert_eq!(
            outcome(&m, &position(Side::No, 5), U256::ZERO),
            Outcome::Open {
                side: Side::No,
                amount: U256::from(5)
            }
        );
        assert_eq!(outcome(&m, &Position::default(), U256::ZERO), Outcome::NoPosition);
    }

    #[tokio::test]
    async fn test_read_caches_latest() {
        let chain = Arc::new(MockChain::new(2));
        let id = chain.add_market(Address::ZERO);
        let user = chain.account();
        chain.set_position(id, user, Side::Yes, 100);

        let reader = SettlementReader::new(chain.clone(), id);
        assert!(reader.latest().await.is_none());

        let snapshot = reader.read(Some(user)).await.unwrap();
        assert_eq!(snapshot.position.amount, U256::from(100));
        assert!(snapshot.token.native);
        assert_eq!(reader.latest().await, Some(snapshot.clone()));

        reader.set_balance(user, U256::from(7)).await;
        assert_eq!(reader.latest().await.unwrap().balance, Some(U256::from(7)));

        let anonymous = reader.latest_for(None).await.unwrap();
        assert_eq!(anonymous.position, Position::default());
    }
}
