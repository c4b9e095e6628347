//! In-memory chain for tests: one wallet, one bet contract, any number of tokens.

use crate::onchain::abi::IOpinionBet;
use crate::onchain::client::{BetContract, ChainError, ProviderError, Wallet};
use crate::onchain::types::{Market, Position, Side, TokenInfo, TxHash, TxReceipt};
use alloy::primitives::{address, Address, U256};
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const CONTRACT: Address = address!("00000000000000000000000000000000000000b1");
pub(crate) const ACCOUNT: Address = address!("00000000000000000000000000000000000000aa");

/// A write the wallet signed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SentTx {
    Approve {
        token: Address,
        spender: Address,
        amount: U256,
    },
    Bet {
        market_id: U256,
        amount: U256,
        side: Side,
        value: U256,
    },
    Claim {
        market_id: U256,
    },
}

#[derive(Default)]
struct State {
    connected: bool,
    wallet_chain: u64,
    reject_switch: bool,
    fail_switch: bool,
    tokens: HashMap<Address, TokenInfo>,
    markets: HashMap<U256, Market>,
    positions: HashMap<(U256, Address), Position>,
    claimable: HashMap<(U256, Address), U256>,
    /// (token, owner) → balance; the zero token is the native balance
    balances: HashMap<(Address, Address), U256>,
    /// (token, owner) → allowance granted to the bet contract
    allowances: HashMap<(Address, Address), U256>,
    receipts: HashMap<TxHash, TxReceipt>,
    sent: Vec<SentTx>,
    allowance_reads: usize,
    nonce: u64,
    reject_next: bool,
    revert_next: bool,
    drop_next_receipt: bool,
}

pub(crate) struct MockChain {
    chain_id: u64,
    state: Mutex<State>,
}

fn rejected() -> ChainError {
    ChainError::Provider(ProviderError::new(Some(4001), "User rejected the request."))
}

fn reverted(reason: &str) -> ChainError {
    ChainError::Provider(ProviderError::new(
        Some(3),
        format!("execution reverted: {reason}"),
    ))
}

fn contract_log(data: alloy::primitives::LogData) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT,
            data,
        },
        ..Default::default()
    }
}

impl MockChain {
    /// A connected wallet on `chain_id`, with the contract deployed there too.
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(State {
                connected: true,
                wallet_chain: chain_id,
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn account(&self) -> Address {
        ACCOUNT
    }

    pub fn disconnect(&self) {
        self.state().connected = false;
    }

    pub fn set_wallet_chain(&self, chain_id: u64) {
        self.state().wallet_chain = chain_id;
    }

    pub fn wallet_chain(&self) -> u64 {
        self.state().wallet_chain
    }

    pub fn reject_switch(&self, reject: bool) {
        self.state().reject_switch = reject;
    }

    pub fn fail_switch(&self, fail: bool) {
        self.state().fail_switch = fail;
    }

    pub fn add_token(&self, symbol: &str, decimals: u8) -> Address {
        let mut state = self.state();
        let address = Address::with_last_byte(0x10 + state.tokens.len() as u8);
        state.tokens.insert(
            address,
            TokenInfo {
                address,
                symbol: symbol.to_string(),
                decimals,
                native: false,
            },
        );
        address
    }

    pub fn token_address(&self, symbol: &str) -> Address {
        self.state()
            .tokens
            .values()
            .find(|t| t.symbol == symbol)
            .map(|t| t.address)
            .unwrap()
    }

    /// An open-ended market that has already started.
    pub fn add_market(&self, token: Address) -> U256 {
        let mut state = self.state();
        let id = U256::from(state.markets.len() + 1);
        state.markets.insert(
            id,
            Market {
                id,
                chain_id: self.chain_id,
                token,
                start_time: 0,
                end_time: 0,
                settled: false,
                winning_side: None,
                total_staked: U256::ZERO,
                staked_yes: U256::ZERO,
                staked_no: U256::ZERO,
            },
        );
        id
    }

    pub fn set_position(&self, market_id: U256, user: Address, side: Side, amount: u64) {
        let amount = U256::from(amount);
        let mut state = self.state();
        state.positions.insert(
            (market_id, user),
            Position {
                side: Some(side),
                amount,
                claimed: false,
            },
        );
        if let Some(market) = state.markets.get_mut(&market_id) {
            market.total_staked += amount;
            match side {
                Side::Yes => market.staked_yes += amount,
                Side::No => market.staked_no += amount,
            }
        }
    }

    pub fn position_of(&self, market_id: U256, user: Address) -> Position {
        self.state()
            .positions
            .get(&(market_id, user))
            .cloned()
            .unwrap_or_default()
    }

    pub fn settle(&self, market_id: U256, winner: Side) {
        let mut state = self.state();
        let market = state.markets.get_mut(&market_id).unwrap();
        market.settled = true;
        market.winning_side = Some(winner);
    }

    pub fn set_claimable(&self, market_id: U256, user: Address, amount: u64) {
        self.state()
            .claimable
            .insert((market_id, user), U256::from(amount));
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state().balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, amount: U256) {
        self.state().allowances.insert((token, owner), amount);
    }

    /// The next signature request is rejected in the wallet.
    pub fn reject_next_signature(&self) {
        self.state().reject_next = true;
    }

    /// The next transaction is mined but reverts, with no state change.
    pub fn revert_next(&self) {
        self.state().revert_next = true;
    }

    /// The next transaction never gets a receipt.
    pub fn drop_next_receipt(&self) {
        self.state().drop_next_receipt = true;
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state().sent.clone()
    }

    pub fn allowance_of(&self, token: Address, owner: Address) -> U256 {
        self.state()
            .allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance_reads(&self) -> usize {
        self.state().allowance_reads
    }

    /// Record a signed transaction and mine it. `apply` runs only if the
    /// transaction succeeds and returns the logs it emits.
    fn mine(
        &self,
        state: &mut State,
        tx: SentTx,
        apply: impl FnOnce(&mut State) -> Vec<Log>,
    ) -> TxHash {
        state.nonce += 1;
        let tx_hash = TxHash::from(U256::from(state.nonce).to_be_bytes::<32>());
        state.sent.push(tx);

        let success = !std::mem::take(&mut state.revert_next);
        let logs = if success { apply(state) } else { Vec::new() };

        if !std::mem::take(&mut state.drop_next_receipt) {
            state.receipts.insert(
                tx_hash,
                TxReceipt {
                    tx_hash,
                    success,
                    block_number: Some(state.nonce),
                    logs,
                },
            );
        }
        tx_hash
    }
}

#[async_trait]
impl Wallet for MockChain {
    async fn connect(&self) -> Result<Address, ChainError> {
        self.state().connected = true;
        Ok(ACCOUNT)
    }

    fn address(&self) -> Option<Address> {
        self.state().connected.then_some(ACCOUNT)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.state().wallet_chain)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ChainError> {
        let mut state = self.state();
        if state.reject_switch {
            return Err(rejected());
        }
        if state.fail_switch {
            return Err(ChainError::Provider(ProviderError::new(
                Some(4902),
                format!("Unrecognized chain ID {chain_id}"),
            )));
        }
        state.wallet_chain = chain_id;
        Ok(())
    }
}

#[async_trait]
impl BetContract for MockChain {
    fn address(&self) -> Address {
        CONTRACT
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn market(&self, market_id: U256) -> Result<Market, ChainError> {
        self.state()
            .markets
            .get(&market_id)
            .cloned()
            .ok_or_else(|| reverted("Event not found"))
    }

    async fn position(&self, market_id: U256, user: Address) -> Result<Position, ChainError> {
        Ok(self.position_of(market_id, user))
    }

    async fn claimable(&self, market_id: U256, user: Address) -> Result<U256, ChainError> {
        Ok(self
            .state()
            .claimable
            .get(&(market_id, user))
            .copied()
            .unwrap_or_default())
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        Ok(Address::with_last_byte(0x01))
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ChainError> {
        if token == Address::ZERO {
            return Ok(TokenInfo {
                address: token,
                symbol: "ETH".to_string(),
                decimals: 18,
                native: true,
            });
        }
        self.state()
            .tokens
            .get(&token)
            .cloned()
            .ok_or_else(|| ChainError::Transport(format!("no token at {token}")))
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        _spender: Address,
    ) -> Result<U256, ChainError> {
        let mut state = self.state();
        state.allowance_reads += 1;
        Ok(state
            .allowances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        Ok(self
            .state()
            .balances
            .get(&(token, owner))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state();
        if std::mem::take(&mut state.reject_next) {
            return Err(rejected());
        }
        let tx = SentTx::Approve {
            token,
            spender,
            amount,
        };
        Ok(self.mine(&mut state, tx, |s| {
            s.allowances.insert((token, ACCOUNT), amount);
            Vec::new()
        }))
    }

    async fn place_bet(
        &self,
        market_id: U256,
        amount: U256,
        side: Side,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state();
        if std::mem::take(&mut state.reject_next) {
            return Err(rejected());
        }

        // Gas estimation runs the call first, so these revert without a tx.
        let market = state
            .markets
            .get(&market_id)
            .cloned()
            .ok_or_else(|| reverted("Event not found"))?;
        if market.settled {
            return Err(reverted("Event settled"));
        }
        let held = state
            .positions
            .get(&(market_id, ACCOUNT))
            .cloned()
            .unwrap_or_default();
        if held.is_open() && held.side != Some(side) {
            return Err(reverted("Choice mismatch"));
        }
        if !market.is_native() {
            let allowance = state
                .allowances
                .get(&(market.token, ACCOUNT))
                .copied()
                .unwrap_or_default();
            if allowance < amount {
                return Err(reverted("ERC20: insufficient allowance"));
            }
        }

        let tx = SentTx::Bet {
            market_id,
            amount,
            side,
            value,
        };
        Ok(self.mine(&mut state, tx, |s| {
            let position = s.positions.entry((market_id, ACCOUNT)).or_default();
            position.side = Some(side);
            position.amount += amount;

            if let Some(market) = s.markets.get_mut(&market_id) {
                market.total_staked += amount;
                match side {
                    Side::Yes => market.staked_yes += amount,
                    Side::No => market.staked_no += amount,
                }
            }

            let balance = s.balances.entry((market.token, ACCOUNT)).or_default();
            *balance = balance.saturating_sub(amount);

            // transferFrom spends allowance unless it is unlimited.
            if !market.is_native() {
                if let Some(allowance) = s.allowances.get_mut(&(market.token, ACCOUNT)) {
                    if *allowance != U256::MAX {
                        *allowance = allowance.saturating_sub(amount);
                    }
                }
            }

            let event = IOpinionBet::BetPlaced {
                eventId: market_id,
                user: ACCOUNT,
                choice: side.code(),
                amount,
            };
            vec![contract_log(event.encode_log_data())]
        }))
    }

    async fn claim(&self, market_id: U256) -> Result<TxHash, ChainError> {
        let mut state = self.state();
        if std::mem::take(&mut state.reject_next) {
            return Err(rejected());
        }
        let key = (market_id, ACCOUNT);
        let already_claimed = state.positions.get(&key).is_some_and(|p| p.claimed);
        let payout = state.claimable.get(&key).copied().unwrap_or_default();
        if already_claimed || payout == U256::ZERO {
            return Err(reverted("Nothing to claim"));
        }
        let token = state
            .markets
            .get(&market_id)
            .map(|m| m.token)
            .unwrap_or_default();

        Ok(self.mine(&mut state, SentTx::Claim { market_id }, |s| {
            s.positions.entry(key).or_default().claimed = true;
            s.claimable.insert(key, U256::ZERO);
            *s.balances.entry((token, ACCOUNT)).or_default() += payout;

            let event = IOpinionBet::Claimed {
                eventId: market_id,
                user: ACCOUNT,
                amount: payout,
            };
            vec![contract_log(event.encode_log_data())]
        }))
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        // Give concurrent callers a chance to run while "mining".
        tokio::task::yield_now().await;
        self.state()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or(ChainError::ReceiptTimeout(tx_hash))
    }
}
