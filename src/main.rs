//! Synthetify Liquidation Bot
//!
//! Keeps the Synthetify exchange solvent by liquidating staking accounts and
//! vault entries whose debt exceeds their collateral limits.
//! Features:
//! - Risk-ordered staking and vault passes on a fixed interval
//! - Live account mirrors while a candidate is being liquidated
//! - Optional selling of received collateral back into xUSD
//! - Read-only collateralization report
//!
//! Usage: `liquidator [all|staking|vaults|sell|check] [--once]`

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use solana_sdk::signer::Signer;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_api::JupiterClient;
use liquidator_chain::{load_keypair, InstructionContext, RpcLedger, SynthetifyClient};
use liquidator_core::report::DEFAULT_TOP;
use liquidator_core::state::{AssetsList, ExchangeState};
use liquidator_core::synchronizer::fetch;
use liquidator_core::{
    collateralization_report, BotConfig, LiquidatorContext, LiquidatorError, PassSummary,
    ProtocolAddresses, Scheduler, TokenSeller,
};

/// Environment variable names.
mod env {
    pub const BOT_CONFIG: &str = "BOT_CONFIG";
    pub const CI: &str = "CI";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    All,
    Staking,
    Vaults,
    Sell,
    Check,
}

impl Mode {
    fn parse(arg: &str) -> Result<Self> {
        Ok(match arg {
            "all" => Mode::All,
            "staking" => Mode::Staking,
            "vaults" => Mode::Vaults,
            "sell" => Mode::Sell,
            "check" => Mode::Check,
            other => anyhow::bail!("unknown mode {other:?}, expected all|staking|vaults|sell|check"),
        })
    }

    fn staking(self) -> bool {
        matches!(self, Mode::All | Mode::Staking)
    }

    fn vaults(self) -> bool {
        matches!(self, Mode::All | Mode::Vaults)
    }
}

struct Args {
    mode: Mode,
    once: bool,
}

fn parse_args() -> Result<Args> {
    let mut mode = Mode::All;
    let mut once = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--once" => once = true,
            other => mode = Mode::parse(other)?,
        }
    }
    Ok(Args { mode, once })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")),
        )
        .init();

    let args = parse_args()?;

    // BOT_CONFIG points at a TOML file, otherwise BOT_PROFILE selects a profile
    let bot_config = match std::env::var(env::BOT_CONFIG) {
        Ok(path) => BotConfig::from_file(&path).with_context(|| format!("loading {path}"))?,
        Err(_) => BotConfig::from_env(),
    };
    bot_config.log_config();

    let one_shot = args.once
        || bot_config.scanner.one_shot
        || std::env::var(env::CI).map(|v| v == "true").unwrap_or(false);
    info!(mode = ?args.mode, one_shot, "Starting Synthetify liquidator");

    let (ctx, usd_token) = initialize_components(&bot_config).await?;

    match args.mode {
        Mode::Check => {
            collateralization_report(&ctx, DEFAULT_TOP).await?.log();
            return Ok(());
        }
        Mode::Sell => {
            let seller = token_seller(&ctx, usd_token)?;
            if one_shot {
                seller.sell_once().await?;
                return Ok(());
            }
            return run_seller(seller, bot_config.seller.interval()).await;
        }
        _ => {}
    }

    let scheduler = Scheduler::new(ctx.clone());
    scheduler.check_balance().await?;

    if one_shot {
        if args.mode.staking() {
            settle("staking", scheduler.staking_pass().await)?;
        }
        if args.mode.vaults() {
            settle("vaults", scheduler.vault_pass().await)?;
        }
        info!("One-shot run finished");
        return Ok(());
    }

    if bot_config.seller.enabled {
        let seller = token_seller(&ctx, usd_token)?;
        tokio::spawn(async move {
            if let Err(e) = run_seller(seller, bot_config.seller.interval()).await {
                error!(error = %e, "Token seller stopped");
            }
        });
    }

    run_passes(&scheduler, args.mode, ctx.config.scanner.scan_interval()).await
}

async fn initialize_components(config: &BotConfig) -> Result<(LiquidatorContext, solana_sdk::pubkey::Pubkey)> {
    info!("Initializing components...");

    let program = config.network.exchange_program_id()?;
    let addresses = ProtocolAddresses::derive(program);
    info!(
        program = %addresses.program,
        state = %addresses.state,
        authority = %addresses.exchange_authority,
        "Protocol addresses derived"
    );

    let keypair = Arc::new(load_keypair()?);
    let ledger = Arc::new(RpcLedger::new(&config.network)?);

    let state = fetch::<ExchangeState>(ledger.as_ref(), &addresses.state).await?;
    let list = fetch::<AssetsList>(ledger.as_ref(), &state.assets_list).await?;
    let usd_token = list
        .settlement_synthetic()
        .map(|s| s.asset_address)
        .ok_or(LiquidatorError::MissingAsset(0))?;
    info!(
        assets_list = %state.assets_list,
        collaterals = list.collaterals.len(),
        synthetics = list.synthetics.len(),
        "Exchange state loaded"
    );

    let exchange = Arc::new(SynthetifyClient::new(
        ledger.rpc(),
        keypair.clone(),
        ledger.commitment(),
        InstructionContext {
            addresses,
            wallet: keypair.pubkey(),
            usd_token,
            assets_list: state.assets_list,
        },
    ));
    info!(wallet = %keypair.pubkey(), "Exchange client initialized");

    let ctx = LiquidatorContext::new(ledger, exchange, config.clone(), addresses);
    info!("All components initialized");
    Ok((ctx, usd_token))
}

fn token_seller(ctx: &LiquidatorContext, usd_token: solana_sdk::pubkey::Pubkey) -> Result<TokenSeller> {
    let jupiter = Arc::new(JupiterClient::new(ctx.config.seller.quote_api_url.clone())?);
    Ok(TokenSeller::new(
        ctx.ledger.clone(),
        ctx.exchange.clone(),
        jupiter,
        ctx.config.seller.clone(),
        usd_token,
    ))
}

/// Fatal errors end the process; anything else is logged and the next tick
/// tries again.
fn settle(pass: &str, result: Result<PassSummary, LiquidatorError>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.is_fatal() => Err(e).with_context(|| format!("{pass} pass")),
        Err(e) => {
            error!(pass, error = %e, "Pass failed");
            Ok(())
        }
    }
}

/// Staking passes every `period`, vault passes offset by half a period.
async fn run_passes(scheduler: &Scheduler, mode: Mode, period: Duration) -> Result<()> {
    let mut staking = interval(period);
    let mut vaults = interval_at(Instant::now() + period / 2, period);
    staking.set_missed_tick_behavior(MissedTickBehavior::Delay);
    vaults.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = period.as_millis() as u64, "Starting main loop...");
    loop {
        tokio::select! {
            _ = staking.tick(), if mode.staking() => {
                settle("staking", scheduler.staking_pass().await)?;
            }
            _ = vaults.tick(), if mode.vaults() => {
                settle("vaults", scheduler.vault_pass().await)?;
            }
        }
    }
}

async fn run_seller(seller: TokenSeller, period: Duration) -> Result<()> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if let Err(e) = seller.sell_once().await {
            error!(error = %e, "Selling round failed");
        }
    }
}
