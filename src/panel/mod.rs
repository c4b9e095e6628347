//! Betting panel for a single market.
//!
//! Composes guard, allowance, bet, settlement and claim for one market and
//! exposes what a front end needs: actions, a [`PanelView`] of booleans to
//! enable/disable controls, and the [`PanelEvent`] stream from [`BetPanel::new`].

use crate::allowance::{AllowanceManager, AllowanceStatus};
use crate::bet::{validate_bet, BetConfirmation, BetDraft, BetSubmitter};
use crate::callback::CallbackSink;
use crate::claim::{ClaimConfirmation, ClaimSubmitter};
use crate::config::BetConfig;
use crate::errors::BetError;
use crate::guard::{ChainGuard, GuardStatus};
use crate::onchain::client::{BetContract, Wallet};
use crate::onchain::types::{Outcome, TxHash};
use crate::onchain::units::to_base_units;
use crate::session::{Action, PanelEvent, PendingFlag, Session, TxPhase};
use crate::settlement::{SettlementReader, Snapshot};
use alloy::primitives::{Address, U256};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Render state. Recomputed on demand; cheap apart from one chain-id read.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelView {
    pub guard: GuardStatus,
    pub can_switch: bool,
    pub can_bet: bool,
    pub needs_approval: bool,
    pub can_claim: bool,
    pub bet_pending: bool,
    pub approving: bool,
    pub claim_pending: bool,
    pub outcome: Option<Outcome>,
    pub balance: Option<U256>,
    pub last_error: Option<String>,
    pub draft: Option<BetDraft>,
}

pub struct BetPanel {
    session: Arc<Session>,
    guard: Arc<ChainGuard>,
    allowance: Arc<AllowanceManager>,
    reader: Arc<SettlementReader>,
    bet: BetSubmitter,
    claim: ClaimSubmitter,
    approving: PendingFlag,
}

impl BetPanel {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        contract: Arc<dyn BetContract>,
        callbacks: Arc<dyn CallbackSink>,
        settings: BetConfig,
        market_id: U256,
    ) -> (Self, UnboundedReceiver<PanelEvent>) {
        let guard = Arc::new(ChainGuard::new(wallet.clone(), contract.chain_id()));
        let allowance = Arc::new(AllowanceManager::new(
            contract.clone(),
            settings.receipt_timeout(),
        ));
        let reader = Arc::new(SettlementReader::new(contract.clone(), market_id));
        let (session, events) = Session::new(wallet, contract, callbacks, settings);
        let session = Arc::new(session);

        let bet = BetSubmitter::new(
            session.clone(),
            guard.clone(),
            allowance.clone(),
            reader.clone(),
        );
        let claim = ClaimSubmitter::new(session.clone(), guard.clone(), reader.clone());

        let panel = Self {
            session,
            guard,
            allowance,
            reader,
            bet,
            claim,
            approving: PendingFlag::default(),
        };
        (panel, events)
    }

    pub fn market_id(&self) -> U256 {
        self.reader.market_id()
    }

    /// Re-read market and position for the connected wallet (if any).
    pub async fn refresh(&self) -> Result<Snapshot, BetError> {
        let snapshot = self.reader.read(self.session.wallet.address()).await?;
        self.session.emit(PanelEvent::Refreshed {
            market_id: self.market_id(),
        });
        Ok(snapshot)
    }

    /// Owner of the bet contract (the market operator).
    pub async fn owner(&self) -> Result<Address, BetError> {
        Ok(self.session.contract.owner().await?)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, BetError> {
        self.reader.latest_for(self.session.wallet.address()).await
    }

    /// Compute the view for an optional draft. Without one, the kept draft
    /// of the last failed bet is used.
    pub async fn view(&self, draft: Option<BetDraft>) -> PanelView {
        let guard = self.guard.check().await;
        let draft = draft.or_else(|| self.bet.draft());
        let user = self.session.wallet.address();
        let snapshot = self
            .reader
            .latest()
            .await
            .filter(|s| s.user == user);

        let bet_pending = self.bet.is_pending();
        let approving = self.approving.is_set();
        let claim_pending = self.claim.is_pending();

        let mut can_bet = false;
        let mut needs_approval = false;
        if let (GuardStatus::Ok, Some(snapshot), Some(user)) = (guard, snapshot.as_ref(), user) {
            let market = &snapshot.market;
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            let open = !market.settled && market.has_started(now) && !market.has_ended(now);

            can_bet = open && !bet_pending && !approving;
            if let Some(draft) = &draft {
                match to_base_units(draft.amount, snapshot.token.decimals) {
                    Ok(amount) => {
                        let balance = snapshot.balance.unwrap_or_default();
                        can_bet &= validate_bet(market, &snapshot.position, draft.side, amount, balance, &snapshot.token, now)
                            .is_ok();
                        needs_approval = open && self.needs_approval(user, market.token, amount).await;
                    }
                    Err(_) => can_bet = false,
                }
            }
        }

        let can_claim = guard.is_ok()
            && !claim_pending
            && snapshot.as_ref().is_some_and(|s| s.claim_enabled());

        PanelView {
            guard,
            can_switch: matches!(guard, GuardStatus::WrongChain { .. }),
            can_bet,
            needs_approval,
            can_claim,
            bet_pending,
            approving,
            claim_pending,
            outcome: snapshot.as_ref().map(|s| s.outcome()),
            balance: snapshot.as_ref().and_then(|s| s.balance),
            last_error: self.session.last_error(),
            draft,
        }
    }

    async fn needs_approval(&self, user: Address, token: Address, amount: U256) -> bool {
        match self.allowance.check(user, token, amount).await {
            Ok(status) => status == AllowanceStatus::Insufficient,
            Err(e) => {
                warn!(error = %e, "allowance read failed");
                false
            }
        }
    }

    pub async fn request_connect(&self) -> Result<(), BetError> {
        match self.guard.request_connect().await {
            Ok(_) => {
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "refresh after connect failed");
                }
                Ok(())
            }
            Err(e) => {
                self.session.toast_error(&e);
                Err(e)
            }
        }
    }

    pub async fn request_switch(&self) -> Result<(), BetError> {
        match self.guard.request_switch().await {
            Ok(()) => {
                if let Err(e) = self.refresh().await {
                    warn!(error = %e, "refresh after chain switch failed");
                }
                Ok(())
            }
            Err(e) => {
                self.session.toast_error(&e);
                Err(e)
            }
        }
    }

    /// Approve the bet contract ahead of a bet. `None` for native markets.
    pub async fn approve(&self) -> Result<Option<TxHash>, BetError> {
        let _pending = self
            .approving
            .try_begin()
            .ok_or(BetError::Busy("approval"))?;

        let result = self.run_approval().await;
        match &result {
            Ok(Some(tx_hash)) => {
                self.session.phase(Action::Approve, TxPhase::Confirmed(*tx_hash));
                self.session.toast_success("Token approved");
            }
            Ok(None) => self.session.phase(Action::Approve, TxPhase::Idle),
            Err(e) => {
                self.session.phase(Action::Approve, TxPhase::Failed(e.to_string()));
                self.session.toast_error(e);
                self.session.phase(Action::Approve, TxPhase::Idle);
            }
        }
        result
    }

    async fn run_approval(&self) -> Result<Option<TxHash>, BetError> {
        self.session.phase(Action::Approve, TxPhase::Validating);
        let user = self.guard.ensure().await?;
        let snapshot = self.reader.latest_for(Some(user)).await?;
        self.session.phase(Action::Approve, TxPhase::Submitting);
        self.allowance
            .request_approval(user, snapshot.market.token)
            .await
    }

    pub async fn place_bet(&self, draft: BetDraft) -> Result<BetConfirmation, BetError> {
        self.bet.place(draft).await
    }

    pub async fn claim(&self) -> Result<Option<ClaimConfirmation>, BetError> {
        self.claim.claim().await
    }

    /// Read the wallet's balance of the market token into the cached snapshot.
    pub async fn poll_balance(&self) -> Result<(), BetError> {
        let Some(user) = self.session.wallet.address() else {
            return Ok(());
        };
        let Some(snapshot) = self.reader.latest().await else {
            return Ok(());
        };
        let balance = self
            .session
            .contract
            .balance(snapshot.market.token, user)
            .await?;
        self.reader.set_balance(user, balance).await;
        Ok(())
    }

    /// Poll the wallet balance until the panel is dropped.
    ///
    /// Runs independently of pending actions.
    pub fn spawn_balance_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let panel = Arc::downgrade(self);
        let every = self.session.settings.balance_poll_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let Some(panel) = panel.upgrade() else {
                    debug!("panel dropped, balance poller stopping");
                    break;
                };
                if let Err(e) = panel.poll_balance().await {
                    warn!(market = %panel.market_id(), error = %e, "balance poll failed");
                }
            }
            info!("balance poller stopped");
        })
    }
}
