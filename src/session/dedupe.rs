//! In-memory marker of transactions whose confirmation effects already ran.

use crate::onchain::types::TxHash;
use dashmap::DashSet;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct ProcessedTxs {
    seen: Arc<DashSet<TxHash>>,
}

impl ProcessedTxs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `hash` as processed. Returns `true` only for the first caller.
    pub fn first_seen(&self, hash: TxHash) -> bool {
        self.seen.insert(hash)
    }
}
