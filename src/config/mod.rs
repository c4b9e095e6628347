use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub bet: BetConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Chain the bet contract is deployed on.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Bet contract address (hex).
    #[serde(default)]
    pub bet_contract: String,
    /// RPC endpoints keyed by chain id. Switching networks picks from these.
    #[serde(default)]
    pub rpc_urls: HashMap<String, String>,
    /// Native currency symbol keyed by chain id.
    #[serde(default)]
    pub native_symbols: HashMap<String, String>,
    /// Wallet private key - loaded from env OPINION_PRIVATE_KEY
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Off-chain API base URL for bet/claim callbacks. Empty disables them.
    #[serde(default)]
    pub url: String,
    /// Bearer token - loaded from env OPINION_API_TOKEN
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BetConfig {
    /// Delay before re-reading market state after a confirmed transaction,
    /// to let the RPC node index the new block.
    #[serde(default = "default_refresh_delay_ms")]
    pub refresh_delay_ms: u64,
    /// How long to wait for a transaction receipt.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
    /// Wallet balance polling interval.
    #[serde(default = "default_balance_poll_secs")]
    pub balance_poll_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_chain_id() -> u64 {
    8453
}
fn default_api_timeout_ms() -> u64 {
    5_000
}
fn default_refresh_delay_ms() -> u64 {
    2_000
}
fn default_receipt_timeout_secs() -> u64 {
    120
}
fn default_balance_poll_secs() -> u64 {
    15
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            timeout_ms: default_api_timeout_ms(),
        }
    }
}

impl Default for BetConfig {
    fn default() -> Self {
        Self {
            refresh_delay_ms: default_refresh_delay_ms(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
            balance_poll_secs: default_balance_poll_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl BetConfig {
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn balance_poll_interval(&self) -> Duration {
        Duration::from_secs(self.balance_poll_secs.max(1))
    }
}

impl ChainConfig {
    pub fn native_symbol(&self, chain_id: u64) -> String {
        self.native_symbols
            .get(&chain_id.to_string())
            .cloned()
            .unwrap_or_else(|| "ETH".to_string())
    }

    pub fn rpc_url_for(&self, chain_id: u64) -> Option<&str> {
        self.rpc_urls.get(&chain_id.to_string()).map(String::as_str)
    }

    /// Endpoints with parseable chain id keys.
    pub fn endpoints(&self) -> HashMap<u64, String> {
        self.rpc_urls
            .iter()
            .filter_map(|(id, url)| id.trim().parse().ok().map(|id| (id, url.clone())))
            .collect()
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Override secrets from environment variables (never store in config file)
        if let Ok(key) = std::env::var("OPINION_PRIVATE_KEY") {
            config.chain.private_key = key;
        }
        if let Ok(token) = std::env::var("OPINION_API_TOKEN") {
            config.api.token = token;
        }

        Ok(config)
    }

    /// Build a config from environment variables only (no file needed).
    pub fn from_env() -> Result<Self, ConfigError> {
        let chain_id = match std::env::var("OPINION_CHAIN_ID") {
            Ok(v) => v
                .parse()
                .map_err(|_| ConfigError::MissingEnv("OPINION_CHAIN_ID (numeric)".to_string()))?,
            Err(_) => default_chain_id(),
        };
        let bet_contract = std::env::var("OPINION_BET_CONTRACT")
            .map_err(|_| ConfigError::MissingEnv("OPINION_BET_CONTRACT".to_string()))?;
        let rpc_url = std::env::var("OPINION_RPC_URL")
            .map_err(|_| ConfigError::MissingEnv("OPINION_RPC_URL".to_string()))?;

        let mut rpc_urls = HashMap::new();
        rpc_urls.insert(chain_id.to_string(), rpc_url);

        Ok(Config {
            chain: ChainConfig {
                chain_id,
                bet_contract,
                rpc_urls,
                native_symbols: HashMap::new(),
                private_key: std::env::var("OPINION_PRIVATE_KEY").unwrap_or_default(),
            },
            api: ApiConfig {
                url: std::env::var("OPINION_API_URL").unwrap_or_default(),
                token: std::env::var("OPINION_API_TOKEN").unwrap_or_default(),
                timeout_ms: default_api_timeout_ms(),
            },
            bet: BetConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    pub fn has_wallet(&self) -> bool {
        !self.chain.private_key.is_empty()
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.chain.rpc_url_for(self.chain.chain_id)
    }
}
