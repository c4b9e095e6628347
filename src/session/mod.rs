//! Shared per-panel context: chain collaborators, event channel, settings.
//!
//! Bet and claim submitters both hold an `Arc<Session>`. Everything the
//! presentation layer reacts to (toasts, share prompts, phase changes) goes
//! out through one unbounded event channel.

pub mod dedupe;

pub use dedupe::ProcessedTxs;

use crate::callback::{BetNotification, CallbackSink, ClaimNotification};
use crate::config::BetConfig;
use crate::errors::BetError;
use crate::onchain::client::{BetContract, Wallet};
use crate::onchain::types::{Side, TxHash};
use alloy::primitives::U256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// User-triggered long-running actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Approve,
    Bet,
    Claim,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Approve => write!(f, "approval"),
            Action::Bet => write!(f, "bet"),
            Action::Claim => write!(f, "claim"),
        }
    }
}

/// Transaction state machine phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPhase {
    Idle,
    Validating,
    ApprovalRequired,
    Submitting,
    Confirming(TxHash),
    Confirmed(TxHash),
    Failed(String),
}

impl TxPhase {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            TxPhase::Validating
                | TxPhase::ApprovalRequired
                | TxPhase::Submitting
                | TxPhase::Confirming(_)
        )
    }
}

/// Busy flag that disables an action's trigger while it is in flight.
#[derive(Debug, Default)]
pub struct PendingFlag(AtomicBool);

impl PendingFlag {
    /// Claim the flag. `None` if the action is already running.
    pub fn try_begin(&self) -> Option<PendingGuard<'_>> {
        if self.0.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(PendingGuard(&self.0))
        }
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears its [`PendingFlag`] on drop, including when the future is cancelled.
pub struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Error,
}

/// Events for the presentation layer.
///
/// `SharePrompt` stands in for the front end's `onShare(side)` callback.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    Phase { action: Action, phase: TxPhase },
    Toast { level: ToastLevel, message: String },
    /// First bet in this market confirmed; offer to share the position.
    SharePrompt { market_id: U256, side: Side },
    /// Market/position reads were refreshed.
    Refreshed { market_id: U256 },
}

pub struct Session {
    pub wallet: Arc<dyn Wallet>,
    pub contract: Arc<dyn BetContract>,
    pub callbacks: Arc<dyn CallbackSink>,
    pub processed: ProcessedTxs,
    pub settings: BetConfig,
    events: mpsc::UnboundedSender<PanelEvent>,
    last_error: Mutex<Option<String>>,
}

impl Session {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        contract: Arc<dyn BetContract>,
        callbacks: Arc<dyn CallbackSink>,
        settings: BetConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PanelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            wallet,
            contract,
            callbacks,
            processed: ProcessedTxs::new(),
            settings,
            events,
            last_error: Mutex::new(None),
        };
        (session, rx)
    }

    pub fn emit(&self, event: PanelEvent) {
        let _ = self.events.send(event);
    }

    pub fn phase(&self, action: Action, phase: TxPhase) {
        debug!(action = %action, phase = ?phase, "phase change");
        self.emit(PanelEvent::Phase { action, phase });
    }

    pub fn toast_success(&self, message: impl Into<String>) {
        self.emit(PanelEvent::Toast {
            level: ToastLevel::Success,
            message: message.into(),
        });
    }

    /// Surface a failure to the user and remember it for the view.
    pub fn toast_error(&self, err: &BetError) {
        let message = err.to_string();
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message.clone());
        }
        self.emit(PanelEvent::Toast {
            level: ToastLevel::Error,
            message,
        });
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    pub fn clear_error(&self) {
        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }
    }

    /// Fire-and-forget bet callback. Failures are logged, never retried.
    pub fn notify_bet(&self, notification: BetNotification) {
        let sink = self.callbacks.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.bet_placed(&notification).await {
                warn!(
                    error = %e,
                    tx = %notification.tx_hash,
                    "bet callback failed"
                );
            }
        });
    }

    /// Fire-and-forget claim callback. Failures are logged, never retried.
    pub fn notify_claim(&self, notification: ClaimNotification) {
        let sink = self.callbacks.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.claimed(&notification).await {
                warn!(
                    error = %e,
                    tx = %notification.tx_hash,
                    "claim callback failed"
                );
            }
        });
    }
}
