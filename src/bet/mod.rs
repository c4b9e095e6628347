//! Bet submitter: the core of the betting flow.
//!
//! idle → validating → (approval-required) → submitting → confirming →
//! confirmed | failed. A failure reports one message and drops back to
//! idle with the draft kept, so the user can retry without re-entering it.

pub mod validate;

pub use validate::validate_bet;

use crate::allowance::{AllowanceManager, AllowanceStatus};
use crate::callback::BetNotification;
use crate::errors::{logged, BetError};
use crate::guard::ChainGuard;
use crate::onchain::types::{Side, TokenInfo, TxHash};
use crate::onchain::units::{format_amount, to_base_units};
use crate::session::{Action, PanelEvent, PendingFlag, Session, TxPhase};
use crate::settlement::SettlementReader;
use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// What the user entered.
#[derive(Debug, Clone, PartialEq)]
pub struct BetDraft {
    pub side: Side,
    pub amount: Decimal,
}

/// A bet whose receipt confirmed.
#[derive(Debug, Clone)]
pub struct BetConfirmation {
    pub tx_hash: TxHash,
    pub market_id: U256,
    pub chain_id: u64,
    pub user: Address,
    pub side: Side,
    pub amount: U256,
    pub token: TokenInfo,
    /// The wallet held nothing in this market before the bet.
    pub first_bet: bool,
}

pub struct BetSubmitter {
    session: Arc<Session>,
    guard: Arc<ChainGuard>,
    allowance: Arc<AllowanceManager>,
    reader: Arc<SettlementReader>,
    pending: PendingFlag,
    phase: Mutex<TxPhase>,
    draft: Mutex<Option<BetDraft>>,
}

impl BetSubmitter {
    pub fn new(
        session: Arc<Session>,
        guard: Arc<ChainGuard>,
        allowance: Arc<AllowanceManager>,
        reader: Arc<SettlementReader>,
    ) -> Self {
        Self {
            session,
            guard,
            allowance,
            reader,
            pending: PendingFlag::default(),
            phase: Mutex::new(TxPhase::Idle),
            draft: Mutex::new(None),
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

    /// The last draft that has not been placed successfully.
    pub fn draft(&self) -> Option<BetDraft> {
        self.draft.lock().ok().and_then(|d| d.clone())
    }

    fn set_draft(&self, draft: Option<BetDraft>) {
        if let Ok(mut slot) = self.draft.lock() {
            *slot = draft;
        }
    }

    fn set_phase(&self, phase: TxPhase) {
        if let Ok(mut current) = self.phase.lock() {
            *current = phase.clone();
        }
        self.session.phase(Action::Bet, phase);
    }

    /// Place a bet. Runs approval first when the allowance is short.
    pub async fn place(&self, draft: BetDraft) -> Result<BetConfirmation, BetError> {
        let _pending = self.pending.try_begin().ok_or(BetError::Busy("bet"))?;
        self.set_draft(Some(draft.clone()));

        match self.run(&draft).await {
            Ok(confirmation) => {
                self.set_draft(None);
                self.session.clear_error();
                self.set_phase(TxPhase::Confirmed(confirmation.tx_hash));
                Ok(confirmation)
            }
            Err(e) => {
                warn!(
                    market = %self.reader.market_id(),
                    side = %draft.side,
                    amount = %draft.amount,
                    error = %e,
                    "bet failed"
                );
                self.set_phase(TxPhase::Failed(e.to_string()));
                self.session.toast_error(&e);
                self.set_phase(TxPhase::Idle);
                Err(e)
            }
        }
    }

    async fn run(&self, draft: &BetDraft) -> Result<BetConfirmation, BetError> {
        self.set_phase(TxPhase::Validating);

        let user = self.guard.ensure().await?;
        let snapshot = self.reader.read(Some(user)).await?;
        let market = &snapshot.market;
        let token = snapshot.token.clone();

        let amount = to_base_units(draft.amount, token.decimals)?;
        let balance = snapshot.balance.unwrap_or_default();
        validate_bet(market, &snapshot.position, draft.side, amount, balance, &token, now())?;

        if self.allowance.check(user, market.token, amount).await? == AllowanceStatus::Insufficient {
            self.set_phase(TxPhase::ApprovalRequired);
            self.allowance.request_approval(user, market.token).await?;
            if self.allowance.check(user, market.token, amount).await? == AllowanceStatus::Insufficient {
                return Err(BetError::InsufficientAllowance);
            }
        }

        let prior_amount = snapshot.position.amount;
        let value = if market.is_native() { amount } else { U256::ZERO };

        self.set_phase(TxPhase::Submitting);
        let tx_hash = match self
            .session
            .contract
            .place_bet(market.id, amount, draft.side, value)
            .await
            .map_err(logged("bet submission"))
        {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                // A revert may mean the cached allowance no longer holds.
                if matches!(e, BetError::Reverted(_)) {
                    self.allowance.invalidate(user, market.token);
                }
                return Err(e);
            }
        };

        info!(
            market = %market.id,
            side = %draft.side,
            amount = %format_amount(amount, token.decimals),
            token = %token.symbol,
            tx = %tx_hash,
            "bet submitted"
        );

        self.set_phase(TxPhase::Confirming(tx_hash));
        let receipt = self
            .session
            .contract
            .wait_for_receipt(tx_hash, self.session.settings.receipt_timeout())
            .await;
        // The bet spent part of the allowance, or tried to.
        self.allowance.invalidate(user, market.token);
        let receipt = receipt.map_err(logged("bet receipt wait"))?;

        if !receipt.success {
            warn!(tx = %tx_hash, block = ?receipt.block_number, "bet transaction reverted");
            return Err(BetError::Reverted("bet transaction reverted".to_string()));
        }

        let confirmation = BetConfirmation {
            tx_hash,
            market_id: market.id,
            chain_id: market.chain_id,
            user,
            side: draft.side,
            amount,
            token,
            first_bet: prior_amount == U256::ZERO,
        };
        self.handle_confirmation(&confirmation).await;
        Ok(confirmation)
    }

    /// Run the one-time effects of a confirmed bet.
    ///
    /// Returns `false` when this transaction was already processed, in which
    /// case nothing is emitted again.
    pub async fn handle_confirmation(&self, confirmation: &BetConfirmation) -> bool {
        if !self.session.processed.first_seen(confirmation.tx_hash) {
            info!(tx = %confirmation.tx_hash, "bet confirmation already processed, ignoring");
            return false;
        }

        info!(
            market = %confirmation.market_id,
            side = %confirmation.side,
            tx = %confirmation.tx_hash,
            first_bet = confirmation.first_bet,
            "bet confirmed"
        );

        self.session.toast_success(format!(
            "Bet placed: {} {} on {}",
            format_amount(confirmation.amount, confirmation.token.decimals),
            confirmation.token.symbol,
            confirmation.side
        ));

        if confirmation.first_bet {
            self.session.emit(PanelEvent::SharePrompt {
                market_id: confirmation.market_id,
                side: confirmation.side,
            });
        }

        self.session.notify_bet(BetNotification {
            market_id: confirmation.market_id,
            amount: confirmation.amount,
            side: confirmation.side,
            token: confirmation.token.address,
            tx_hash: confirmation.tx_hash,
            chain_id: confirmation.chain_id,
        });

        self.reader
            .refresh_after_confirmation(&self.session, confirmation.user)
            .await;
        true
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
