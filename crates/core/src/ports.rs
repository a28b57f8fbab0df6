//! Boundaries to the outside world.
//!
//! The core crate never talks to the network directly. Everything it needs
//! from the ledger, the exchange program and the swap aggregator goes through
//! the traits below, implemented in `liquidator-chain` and `liquidator-api`
//! and replaced by in-memory doubles in tests.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::config::{BotConfig, ProtocolAddresses};
use crate::plan::TransactionPlan;

/// A token account owned by the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenHolding {
    pub account: Pubkey,
    pub mint: Pubkey,
    pub amount: u64,
}

/// Read access to ledger state.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// All accounts owned by `program` whose data is exactly `data_size` bytes.
    async fn program_accounts(
        &self,
        program: &Pubkey,
        data_size: u64,
    ) -> anyhow::Result<Vec<(Pubkey, Vec<u8>)>>;

    /// Raw data of one account, `None` when it does not exist.
    async fn account_data(&self, address: &Pubkey) -> anyhow::Result<Option<Vec<u8>>>;

    async fn slot(&self) -> anyhow::Result<u64>;

    /// Raw balance of an SPL token account.
    async fn token_balance(&self, token_account: &Pubkey) -> anyhow::Result<u64>;

    /// Every SPL token account held by `owner`.
    async fn token_holdings(&self, owner: &Pubkey) -> anyhow::Result<Vec<TokenHolding>>;

    /// Push notifications of `address`'s data. The stream ends when the
    /// subscription drops.
    async fn subscribe(&self, address: &Pubkey) -> anyhow::Result<BoxStream<'static, Vec<u8>>>;
}

/// Write access through the exchange program.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// The liquidator's wallet.
    fn wallet(&self) -> Pubkey;

    /// Associated token account of the wallet for `mint`, created if missing.
    async fn token_account(&self, mint: &Pubkey) -> anyhow::Result<Pubkey>;

    /// Ask the program to flag an undercollateralized account, starting its
    /// liquidation deadline.
    async fn check_account(&self, exchange_account: &Pubkey) -> anyhow::Result<Signature>;

    /// Encode, sign and send `plan` as one transaction.
    async fn execute(&self, plan: &TransactionPlan) -> anyhow::Result<Signature>;

    /// Sign and send a base64 transaction produced by a third party.
    async fn submit_serialized(&self, transaction: &str) -> anyhow::Result<Signature>;
}

/// Best route found by a swap aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Price impact as a fraction (0.01 = 1 %).
    pub price_impact: f64,
    /// Aggregator-specific route, handed back verbatim when building the swap.
    pub route: serde_json::Value,
}

#[async_trait]
pub trait SwapAggregator: Send + Sync {
    /// Best route for `amount` of `input_mint`, `None` when there is none.
    async fn quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> anyhow::Result<Option<SwapQuote>>;

    /// Serialized (base64) transactions executing `quote` for `user`, in
    /// submission order.
    async fn swap_transactions(&self, quote: &SwapQuote, user: &Pubkey) -> anyhow::Result<Vec<String>>;
}

/// Everything a pass needs, built once at start-up.
#[derive(Clone)]
pub struct LiquidatorContext {
    pub ledger: Arc<dyn Ledger>,
    pub exchange: Arc<dyn ExchangeClient>,
    pub config: BotConfig,
    pub addresses: ProtocolAddresses,
}

impl LiquidatorContext {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        exchange: Arc<dyn ExchangeClient>,
        config: BotConfig,
        addresses: ProtocolAddresses,
    ) -> Self {
        Self {
            ledger,
            exchange,
            config,
            addresses,
        }
    }
}
