//! Claim submitter.
//!
//! Same shape as the bet flow, minus approval: validating → submitting →
//! confirming → confirmed | failed. Eligibility is re-read from the contract
//! right before the claim is sent.

use crate::callback::ClaimNotification;
use crate::errors::{logged, BetError};
use crate::guard::ChainGuard;
use crate::onchain::abi::decode_claimed_amount;
use crate::onchain::types::{Side, TokenInfo, TxHash};
use crate::onchain::units::format_amount;
use crate::session::{Action, PendingFlag, Session, TxPhase};
use crate::settlement::SettlementReader;
use alloy::primitives::{Address, U256};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ClaimConfirmation {
    pub tx_hash: TxHash,
    pub market_id: U256,
    pub chain_id: u64,
    pub receiver: Address,
    pub side: Option<Side>,
    pub payout: U256,
    pub token: TokenInfo,
}

pub struct ClaimSubmitter {
    session: Arc<Session>,
    guard: Arc<ChainGuard>,
    reader: Arc<SettlementReader>,
    pending: PendingFlag,
    phase: Mutex<TxPhase>,
}

impl ClaimSubmitter {
    pub fn new(session: Arc<Session>, guard: Arc<ChainGuard>, reader: Arc<SettlementReader>) -> Self {
        Self {
            session,
            guard,
            reader,
            pending: PendingFlag::default(),
            phase: Mutex::new(TxPhase::Idle),
        }
    }

    pub fn phase(&self) -> TxPhase {
        self.phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or(TxPhase::Idle)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_set()
    }

    fn set_phase(&self, phase: TxPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.clone();
        }
        self.session.phase(Action::Claim, phase);
    }

    /// Claim winnings for the connected wallet.
    ///
    /// `Ok(None)` when both the last known state and a fresh read show
    /// nothing to claim; no transaction is attempted in that case.
    pub async fn claim(&self) -> Result<Option<ClaimConfirmation>, BetError> {
        let _pending = self.pending.try_begin().ok_or(BetError::Busy("claim"))?;

        if let Some(user) = self.session.wallet.address() {
            let cached_disabled = self
                .reader
                .latest()
                .await
                .is_some_and(|s| s.user == Some(user) && !s.claim_enabled());
            // The market may have settled since the last read.
            if cached_disabled {
                match self.reader.read(Some(user)).await {
                    Ok(fresh) if !fresh.claim_enabled() => {
                        debug!(market = %self.reader.market_id(), "claim not enabled, ignoring");
                        return Ok(None);
                    }
                    Ok(_) => debug!(market = %self.reader.market_id(), "claim enabled since last read"),
                    Err(e) => debug!(error = %e, "claim eligibility re-read failed"),
                }
            }
        }

        match self.run().await {
            Ok(confirmation) => {
                self.session.clear_error();
                self.set_phase(TxPhase::Confirmed(confirmation.tx_hash));
                Ok(Some(confirmation))
            }
            Err(e) => {
                warn!(market = %self.reader.market_id(), error = %e, "claim failed");
                self.set_phase(TxPhase::Failed(e.to_string()));
                self.session.toast_error(&e);
                self.set_phase(TxPhase::Idle);
                Err(e)
            }
        }
    }

    async fn run(&self) -> Result<ClaimConfirmation, BetError> {
        self.set_phase(TxPhase::Validating);

        let user = self.guard.ensure().await?;
        let snapshot = self.reader.read(Some(user)).await?;
        if !snapshot.claim_enabled() {
            return Err(BetError::NotEligible);
        }
        let market_id = snapshot.market.id;
        let staked = snapshot.position.amount;

        self.set_phase(TxPhase::Submitting);
        let tx_hash = self
            .session
            .contract
            .claim(market_id)
            .await
            .map_err(logged("claim submission"))?;
        info!(market = %market_id, tx = %tx_hash, "claim submitted");

        self.set_phase(TxPhase::Confirming(tx_hash));
        let receipt = self
            .session
            .contract
            .wait_for_receipt(tx_hash, self.session.settings.receipt_timeout())
            .await
            .map_err(logged("claim receipt wait"))?;

        if !receipt.success {
            warn!(tx = %tx_hash, block = ?receipt.block_number, "claim transaction reverted");
            return Err(BetError::Reverted("claim transaction reverted".to_string()));
        }

        let payout = decode_claimed_amount(&receipt.logs, self.session.contract.address(), market_id, user)
            .unwrap_or_else(|| {
                warn!(tx = %tx_hash, "no Claimed event in receipt, reporting staked amount");
                staked
            });

        let confirmation = ClaimConfirmation {
            tx_hash,
            market_id,
            chain_id: snapshot.market.chain_id,
            receiver: user,
            side: snapshot.position.side,
            payout,
            token: snapshot.token,
        };
        self.handle_confirmation(&confirmation).await;
        Ok(confirmation)
    }

    /// One-time effects of a confirmed claim. `false` if already processed.
    pub async fn handle_confirmation(&self, confirmation: &ClaimConfirmation) -> bool {
        if !self.session.processed.first_seen(confirmation.tx_hash) {
            info!(tx = %confirmation.tx_hash, "claim confirmation already processed, ignoring");
            return false;
        }

        info!(
            market = %confirmation.market_id,
            payout = %confirmation.payout,
            tx = %confirmation.tx_hash,
            "claim confirmed"
        );

        // The node may lag behind the receipt; never show the claim as open again.
        self.reader
            .update_latest(|s| {
                if s.user == Some(confirmation.receiver) {
                    s.position.claimed = true;
                    s.claimable = U256::ZERO;
                }
            })
            .await;

        self.session.toast_success(format!(
            "Claimed {} {}",
            format_amount(confirmation.payout, confirmation.token.decimals),
            confirmation.token.symbol
        ));

        self.session.notify_claim(ClaimNotification {
            market_id: confirmation.market_id,
            receiver: confirmation.receiver,
            amount: confirmation.payout,
            side: confirmation.side,
            token: confirmation.token.address,
            tx_hash: confirmation.tx_hash,
            chain_id: confirmation.chain_id,
        });

        self.reader
            .refresh_after_confirmation(&self.session, confirmation.receiver)
            .await;
        true
    }
}
