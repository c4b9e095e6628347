//! Best-effort notifications to the off-chain API after confirmed bets and claims.
//!
//! The backend uses these to update leaderboards and activity feeds. They
//! are fire-and-forget: the on-chain transaction is the source of truth, so
//! a failed callback is only logged.

use crate::onchain::types::{Side, TxHash};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("invalid auth token")]
    InvalidToken,
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    ApiError { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BetNotification {
    pub market_id: U256,
    pub amount: U256,
    pub side: Side,
    pub token: Address,
    pub tx_hash: TxHash,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimNotification {
    pub market_id: U256,
    pub receiver: Address,
    pub amount: U256,
    pub side: Option<Side>,
    pub token: Address,
    pub tx_hash: TxHash,
    pub chain_id: u64,
}

#[async_trait]
pub trait CallbackSink: Send + Sync {
    async fn bet_placed(&self, notification: &BetNotification) -> Result<(), CallbackError>;

    async fn claimed(&self, notification: &ClaimNotification) -> Result<(), CallbackError>;
}

/// HTTP client for the off-chain callback endpoints.
pub struct CallbackClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl CallbackClient {
    pub fn new(base_url: String, token: String, timeout: Duration) -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn headers(&self) -> Result<HeaderMap, CallbackError> {
        let mut headers = HeaderMap::new();
        if !self.token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", self.token))
                .map_err(|_| CallbackError::InvalidToken)?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// POST a JSON body, treating any 4xx/5xx as an error.
    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), CallbackError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status >= 400 {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallbackError::ApiError { status, body });
        }
        debug!(path = path, status = status, "callback delivered");
        Ok(())
    }
}

#[async_trait]
impl CallbackSink for CallbackClient {
    async fn bet_placed(&self, notification: &BetNotification) -> Result<(), CallbackError> {
        self.post("/bet/callback", notification).await
    }

    async fn claimed(&self, notification: &ClaimNotification) -> Result<(), CallbackError> {
        self.post("/claim/callback", notification).await
    }
}

/// Sink used when no API URL is configured.
pub struct NoopCallbacks;

#[async_trait]
impl CallbackSink for NoopCallbacks {
    async fn bet_placed(&self, notification: &BetNotification) -> Result<(), CallbackError> {
        debug!(tx = %notification.tx_hash, "no callback API configured, skipping bet callback");
        Ok(())
    }

    async fn claimed(&self, notification: &ClaimNotification) -> Result<(), CallbackError> {
        debug!(tx = %notification.tx_hash, "no callback API configured, skipping claim callback");
        Ok(())
    }
}
