//! alloy-backed wallet and contract.
//!
//! `RpcWallet` holds a local signer and one HTTP endpoint per configured
//! chain; "switching chain" selects another endpoint. `RpcContract` reads from
//! its deployment chain and sends writes through the wallet's active chain.

use crate::onchain::abi::{market_from_info, position_from_bet, IOpinionBet, IERC20};
use crate::onchain::client::{BetContract, ChainError, ProviderError, Wallet};
use crate::onchain::types::{Market, Position, Side, TokenInfo, TxHash, TxReceipt};
use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

impl From<TransportError> for ChainError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => ChainError::Provider(ProviderError {
                code: Some(payload.code),
                message: payload.message.to_string(),
                data: payload
                    .data
                    .as_ref()
                    .and_then(|raw| serde_json::from_str(raw.get()).ok()),
            }),
            None => ChainError::Transport(err.to_string()),
        }
    }
}

impl From<alloy::contract::Error> for ChainError {
    fn from(err: alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(e) => e.into(),
            other => ChainError::Provider(ProviderError::new(None, other.to_string())),
        }
    }
}

fn http_provider(url: &str, signer: Option<&PrivateKeySigner>) -> Result<DynProvider, ChainError> {
    let url = url
        .parse()
        .map_err(|e| ChainError::Transport(format!("bad RPC url {url}: {e}")))?;
    let provider = match signer {
        Some(signer) => ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer.clone()))
            .connect_http(url)
            .erased(),
        None => ProviderBuilder::new().connect_http(url).erased(),
    };
    Ok(provider)
}

/// Local-key wallet over HTTP RPC.
pub struct RpcWallet {
    signer: Option<PrivateKeySigner>,
    endpoints: HashMap<u64, String>,
    connected: AtomicBool,
    /// Active chain and its signing provider.
    active: Mutex<(u64, Option<DynProvider>)>,
}

impl RpcWallet {
    pub fn new(
        private_key: Option<&str>,
        endpoints: HashMap<u64, String>,
        chain_id: u64,
    ) -> Result<Self, ChainError> {
        let signer = private_key
            .map(|key| PrivateKeySigner::from_str(key.trim()).map_err(|e| ChainError::Signer(e.to_string())))
            .transpose()?;
        Ok(Self {
            signer,
            endpoints,
            connected: AtomicBool::new(false),
            active: Mutex::new((chain_id, None)),
        })
    }

    fn active_chain(&self) -> u64 {
        self.active.lock().map(|a| a.0).unwrap_or_default()
    }

    /// Signing provider for the active chain, built on first use.
    fn provider(&self) -> Result<DynProvider, ChainError> {
        let signer = self.signer.as_ref().ok_or(ChainError::NotConnected)?;
        let mut active = self
            .active
            .lock()
            .map_err(|_| ChainError::Transport("wallet state poisoned".to_string()))?;
        if let Some(provider) = &active.1 {
            return Ok(provider.clone());
        }
        let url = self
            .endpoints
            .get(&active.0)
            .ok_or(ChainError::UnknownChain(active.0))?;
        let provider = http_provider(url, Some(signer))?;
        active.1 = Some(provider.clone());
        Ok(provider)
    }
}

#[async_trait]
impl Wallet for RpcWallet {
    async fn connect(&self) -> Result<Address, ChainError> {
        let address = self
            .signer
            .as_ref()
            .map(|s| s.address())
            .ok_or(ChainError::NotConnected)?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(address)
    }

    fn address(&self) -> Option<Address> {
        if !self.connected.load(Ordering::SeqCst) {
            return None;
        }
        self.signer.as_ref().map(|s| s.address())
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        let provider = self.provider()?;
        Ok(provider.get_chain_id().await?)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ChainError> {
        if !self.endpoints.contains_key(&chain_id) {
            return Err(ChainError::UnknownChain(chain_id));
        }
        let mut active = self
            .active
            .lock()
            .map_err(|_| ChainError::Transport("wallet state poisoned".to_string()))?;
        *active = (chain_id, None);
        info!(chain = chain_id, "switched RPC endpoint");
        Ok(())
    }
}

/// One bet contract deployment.
pub struct RpcContract {
    address: Address,
    chain_id: u64,
    native_symbol: String,
    reader: DynProvider,
    wallet: Arc<RpcWallet>,
}

impl RpcContract {
    pub fn new(
        address: Address,
        chain_id: u64,
        rpc_url: &str,
        native_symbol: String,
        wallet: Arc<RpcWallet>,
    ) -> Result<Self, ChainError> {
        Ok(Self {
            address,
            chain_id,
            native_symbol,
            reader: http_provider(rpc_url, None)?,
            wallet,
        })
    }

    fn bet(&self) -> IOpinionBet::IOpinionBetInstance<DynProvider> {
        IOpinionBet::new(self.address, self.reader.clone())
    }

    async fn poll_receipt(
        &self,
        provider: &DynProvider,
        tx_hash: TxHash,
    ) -> Result<TransactionReceipt, ChainError> {
        loop {
            if let Some(receipt) = provider.get_transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            debug!(tx = %tx_hash, chain = self.wallet.active_chain(), "receipt not yet available");
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    fn bet_writer(&self) -> Result<IOpinionBet::IOpinionBetInstance<DynProvider>, ChainError> {
        Ok(IOpinionBet::new(self.address, self.wallet.provider()?))
    }
}

#[async_trait]
impl BetContract for RpcContract {
    fn address(&self) -> Address {
        self.address
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn market(&self, market_id: U256) -> Result<Market, ChainError> {
        let info = self.bet().getEvent(market_id).call().await?;
        Ok(market_from_info(market_id, self.chain_id, &info))
    }

    async fn position(&self, market_id: U256, user: Address) -> Result<Position, ChainError> {
        let bet = self.bet().getUserBet(market_id, user).call().await?;
        Ok(position_from_bet(&bet))
    }

    async fn claimable(&self, market_id: U256, user: Address) -> Result<U256, ChainError> {
        Ok(self.bet().claimable(market_id, user).call().await?)
    }

    async fn owner(&self) -> Result<Address, ChainError> {
        Ok(self.bet().owner().call().await?)
    }

    async fn token_info(&self, token: Address) -> Result<TokenInfo, ChainError> {
        if token == Address::ZERO {
            return Ok(TokenInfo {
                address: token,
                symbol: self.native_symbol.clone(),
                decimals: 18,
                native: true,
            });
        }
        let erc20 = IERC20::new(token, self.reader.clone());
        let decimals = erc20.decimals().call().await?;
        let symbol = erc20.symbol().call().await?;
        Ok(TokenInfo {
            address: token,
            symbol,
            decimals,
            native: false,
        })
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let erc20 = IERC20::new(token, self.reader.clone());
        Ok(erc20.allowance(owner, spender).call().await?)
    }

    async fn balance(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        if token == Address::ZERO {
            return Ok(self.reader.get_balance(owner).await?);
        }
        let erc20 = IERC20::new(token, self.reader.clone());
        Ok(erc20.balanceOf(owner).call().await?)
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let erc20 = IERC20::new(token, self.wallet.provider()?);
        let pending = erc20.approve(spender, amount).send().await?;
        Ok(*pending.tx_hash())
    }

    async fn place_bet(
        &self,
        market_id: U256,
        amount: U256,
        side: Side,
        value: U256,
    ) -> Result<TxHash, ChainError> {
        let pending = self
            .bet_writer()?
            .doBet(market_id, amount, side.code())
            .value(value)
            .send()
            .await?;
        Ok(*pending.tx_hash())
    }

    async fn claim(&self, market_id: U256) -> Result<TxHash, ChainError> {
        let pending = self.bet_writer()?.claim(market_id).send().await?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<TxReceipt, ChainError> {
        let provider = self.wallet.provider()?;
        let receipt = tokio::time::timeout(timeout, self.poll_receipt(&provider, tx_hash))
            .await
            .map_err(|_| ChainError::ReceiptTimeout(tx_hash))??;

        Ok(TxReceipt {
            tx_hash,
            success: receipt.status(),
            block_number: receipt.block_number,
            logs: receipt.inner.logs().to_vec(),
        })
    }
}
