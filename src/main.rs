use alloy::primitives::{Address, U256};
use anyhow::{bail, Context};
use opinion_market::bet::BetDraft;
use opinion_market::callback::{CallbackClient, CallbackSink, NoopCallbacks};
use opinion_market::config::Config;
use opinion_market::onchain::units::format_amount;
use opinion_market::onchain::{RpcContract, RpcWallet, Side};
use opinion_market::panel::BetPanel;
use opinion_market::session::{PanelEvent, ToastLevel};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const USAGE: &str = "usage: opinion <command> <market-id> [args]\n\
  commands: status | approve | bet <yes|no> <amount> | claim | switch";

enum Command {
    Status,
    Approve,
    Bet(BetDraft),
    Claim,
    Switch,
}

/// `opinion <command> <market-id> [args]`
fn parse_args(args: &[String]) -> anyhow::Result<(Command, U256)> {
    let (command, rest) = args.split_first().context(USAGE)?;
    let market_id = rest.first().context(USAGE)?;
    let market_id = U256::from_str(market_id).with_context(|| format!("bad market id: {market_id}"))?;

    let command = match command.as_str() {
        "status" => Command::Status,
        "approve" => Command::Approve,
        "claim" => Command::Claim,
        "switch" => Command::Switch,
        "bet" => {
            let side = rest.get(1).context(USAGE)?;
            let amount = rest.get(2).context(USAGE)?;
            Command::Bet(BetDraft {
                side: Side::from_str(side).map_err(anyhow::Error::msg)?,
                amount: Decimal::from_str(amount).with_context(|| format!("bad amount: {amount}"))?,
            })
        }
        other => bail!("unknown command {other}\n{USAGE}"),
    };
    Ok((command, market_id))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let config = if Path::new("opinion.toml").exists() {
        Config::load(Path::new("opinion.toml"))?
    } else {
        Config::from_env()?
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("opinion v{} starting", env!("CARGO_PKG_VERSION"));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, market_id) = parse_args(&args)?;

    // --- Chain ---
    let chain_id = config.chain.chain_id;
    let rpc_url = config
        .rpc_url()
        .with_context(|| format!("no RPC url configured for chain {chain_id}"))?;
    let contract_address = Address::from_str(&config.chain.bet_contract)
        .with_context(|| format!("bad bet contract address: {}", config.chain.bet_contract))?;

    if !config.has_wallet() {
        warn!("no private key configured - read-only (set OPINION_PRIVATE_KEY to bet)");
    }
    let private_key = config.has_wallet().then_some(config.chain.private_key.as_str());
    let wallet = Arc::new(RpcWallet::new(private_key, config.chain.endpoints(), chain_id)?);
    let contract = Arc::new(RpcContract::new(
        contract_address,
        chain_id,
        rpc_url,
        config.chain.native_symbol(chain_id),
        wallet.clone(),
    )?);

    // --- Callbacks ---
    let callbacks: Arc<dyn CallbackSink> = if config.api.url.is_empty() {
        info!("no API url configured, callbacks disabled");
        Arc::new(NoopCallbacks)
    } else {
        Arc::new(CallbackClient::new(
            config.api.url.clone(),
            config.api.token.clone(),
            Duration::from_millis(config.api.timeout_ms),
        )?)
    };

    let (panel, mut events) = BetPanel::new(wallet, contract, callbacks, config.bet.clone(), market_id);

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PanelEvent::Toast {
                    level: ToastLevel::Success,
                    message,
                } => info!("{}", message),
                PanelEvent::Toast {
                    level: ToastLevel::Error,
                    message,
                } => error!("{}", message),
                PanelEvent::SharePrompt { market_id, side } => {
                    info!(market = %market_id, side = %side, "first bet placed, share your position")
                }
                PanelEvent::Phase { action, phase } => info!(action = %action, phase = ?phase, "phase"),
                PanelEvent::Refreshed { market_id } => info!(market = %market_id, "market refreshed"),
            }
        }
    });

    if config.has_wallet() {
        panel.request_connect().await?;
    } else {
        panel.refresh().await?;
    }

    match command {
        Command::Status => {
            let snapshot = panel.snapshot().await?;
            let view = panel.view(None).await;
            let decimals = snapshot.token.decimals;
            match panel.owner().await {
                Ok(owner) => info!(owner = %owner, "market contract"),
                Err(e) => warn!(error = %e, "could not read contract owner"),
            }
            info!(
                market = %market_id,
                token = %snapshot.token.symbol,
                settled = snapshot.market.settled,
                winner = ?snapshot.market.winning_side,
                yes = %format_amount(snapshot.market.staked_on(Side::Yes), decimals),
                no = %format_amount(snapshot.market.staked_on(Side::No), decimals),
                "market"
            );
            info!(
                side = ?snapshot.position.side,
                staked = %format_amount(snapshot.position.amount, decimals),
                claimable = %format_amount(snapshot.claimable, decimals),
                outcome = ?view.outcome,
                guard = ?view.guard,
                can_bet = view.can_bet,
                can_claim = view.can_claim,
                "position"
            );
        }
        Command::Approve => {
            panel.approve().await?;
        }
        Command::Bet(draft) => {
            panel.place_bet(draft).await?;
        }
        Command::Claim => {
            if panel.claim().await?.is_none() {
                info!("nothing to claim");
            }
        }
        Command::Switch => {
            panel.request_switch().await?;
        }
    }

    // Let fire-and-forget callbacks and the event log drain.
    tokio::time::sleep(Duration::from_millis(500)).await;
    Ok(())
}
