//! Sells tokens left in the wallet after liquidations back into xUSD.
//!
//! Liquidations pay out in collateral. Every holding other than xUSD (and a
//! configured skip list) is quoted through the swap aggregator and sold when
//! the route returns enough xUSD at an acceptable price impact.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use liquidator_api::{JupiterClient, QuoteResponse};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, instrument, warn};

use crate::config::SellerConfig;
use crate::ports::{ExchangeClient, Ledger, SwapAggregator, SwapQuote, TokenHolding};

/// Counters of one selling round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SellSummary {
    pub holdings: usize,
    pub sold: usize,
    /// No route, or a route not worth taking
    pub skipped: usize,
    pub failed: usize,
}

pub struct TokenSeller {
    ledger: Arc<dyn Ledger>,
    exchange: Arc<dyn ExchangeClient>,
    aggregator: Arc<dyn SwapAggregator>,
    config: SellerConfig,
    xusd_mint: Pubkey,
    skip: Vec<Pubkey>,
}

impl TokenSeller {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        exchange: Arc<dyn ExchangeClient>,
        aggregator: Arc<dyn SwapAggregator>,
        config: SellerConfig,
        xusd_mint: Pubkey,
    ) -> Self {
        let skip = config
            .skip_mints
            .iter()
            .filter_map(|mint| match Pubkey::from_str(mint) {
                Ok(key) => Some(key),
                Err(e) => {
                    warn!(mint = %mint, error = %e, "Ignoring invalid skip mint");
                    None
                }
            })
            .collect();
        Self {
            ledger,
            exchange,
            aggregator,
            config,
            xusd_mint,
            skip,
        }
    }

    fn wants_to_sell(&self, holding: &TokenHolding) -> bool {
        holding.amount > 0 && holding.mint != self.xusd_mint && !self.skip.contains(&holding.mint)
    }

    /// Quote and sell every eligible holding once.
    #[instrument(skip(self))]
    pub async fn sell_once(&self) -> anyhow::Result<SellSummary> {
        let wallet = self.exchange.wallet();
        let holdings: Vec<TokenHolding> = self
            .ledger
            .token_holdings(&wallet)
            .await?
            .into_iter()
            .filter(|h| self.wants_to_sell(h))
            .collect();

        let mut summary = SellSummary {
            holdings: holdings.len(),
            ..Default::default()
        };
        for holding in &holdings {
            match self.sell(holding, &wallet).await {
                Ok(true) => summary.sold += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    warn!(mint = %holding.mint, amount = holding.amount, error = %e, "Selling failed");
                    summary.failed += 1;
                }
            }
        }

        if summary.sold > 0 || summary.failed > 0 {
            info!(
                holdings = summary.holdings,
                sold = summary.sold,
                failed = summary.failed,
                "Selling round finished"
            );
        }
        Ok(summary)
    }

    /// `true` when the holding was sold.
    async fn sell(&self, holding: &TokenHolding, wallet: &Pubkey) -> anyhow::Result<bool> {
        let Some(quote) = self
            .aggregator
            .quote(
                &holding.mint,
                &self.xusd_mint,
                holding.amount,
                self.config.slippage_bps,
            )
            .await?
        else {
            debug!(mint = %holding.mint, "No route");
            return Ok(false);
        };

        if !accept_quote(&quote, &self.config) {
            debug!(
                mint = %holding.mint,
                out_amount = quote.out_amount,
                price_impact = quote.price_impact,
                "Route rejected"
            );
            return Ok(false);
        }

        for transaction in self.aggregator.swap_transactions(&quote, wallet).await? {
            let signature = self.exchange.submit_serialized(&transaction).await?;
            debug!(mint = %holding.mint, %signature, "Swap transaction sent");
        }
        info!(
            mint = %holding.mint,
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            "Sold token"
        );
        Ok(true)
    }
}

/// A route is taken when it pays more than `min_out_amount` xUSD and moves the
/// price by less than `max_price_impact_pct` percent.
pub fn accept_quote(quote: &SwapQuote, config: &SellerConfig) -> bool {
    quote.out_amount > config.min_out_amount
        && quote.price_impact * 100.0 < config.max_price_impact_pct
}

#[async_trait]
impl SwapAggregator for JupiterClient {
    async fn quote(
        &self,
        input_mint: &Pubkey,
        output_mint: &Pubkey,
        amount: u64,
        slippage_bps: u16,
    ) -> anyhow::Result<Option<SwapQuote>> {
        let Some(response) = JupiterClient::quote(
            self,
            &input_mint.to_string(),
            &output_mint.to_string(),
            amount,
            slippage_bps,
        )
        .await?
        else {
            return Ok(None);
        };
        Ok(Some(SwapQuote {
            input_mint: *input_mint,
            output_mint: *output_mint,
            in_amount: response.in_amount()?,
            out_amount: response.out_amount()?,
            price_impact: response.price_impact()?,
            route: response.to_value()?,
        }))
    }

    async fn swap_transactions(&self, quote: &SwapQuote, user: &Pubkey) -> anyhow::Result<Vec<String>> {
        let route = QuoteResponse::from_value(quote.route.clone())?;
        let response = self.swap(&route, &user.to_string()).await?;
        Ok(vec![response.swap_transaction])
    }
}
