//! Oracle prices for a scan.
//!
//! The assets list stores the last price the program saw. Before each pass
//! the liquidator re-reads every feed so eligibility is judged on current
//! prices, not on whatever the last `update_prices` left behind.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use crate::decimal::ScaledDecimal;
use crate::error::{LiquidatorError, Result};
use crate::math::ORACLE_OFFSET;
use crate::oracle::price_from_feed;
use crate::ports::Ledger;
use crate::state::{AssetsList, Vault};
use crate::synchronizer::fetch;

/// The assets list with freshly read oracle prices.
#[derive(Debug, Clone)]
pub struct PriceBook {
    address: Pubkey,
    list: AssetsList,
}

impl PriceBook {
    /// Load the assets list at `address` and refresh its prices.
    pub async fn load(ledger: &dyn Ledger, address: Pubkey) -> Result<Self> {
        let list = fetch::<AssetsList>(ledger, &address).await?;
        let mut book = Self { address, list };
        book.refresh(ledger).await;
        Ok(book)
    }

    /// Re-read every feed concurrently. Index 0 (xUSD) is pinned at 1.
    ///
    /// A feed that cannot be read keeps the price stored on chain.
    pub async fn refresh(&mut self, ledger: &dyn Ledger) {
        let feeds: Vec<(usize, Pubkey)> = self
            .list
            .assets
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, asset)| (i, asset.feed_address))
            .collect();

        let results = join_all(feeds.iter().map(|(_, feed)| read_feed(ledger, feed))).await;

        let mut refreshed = 0usize;
        for ((index, feed), result) in feeds.into_iter().zip(results) {
            match result {
                Ok(price) => {
                    self.list.assets[index].price = price;
                    refreshed += 1;
                }
                Err(e) => warn!(%feed, index, error = %e, "Keeping on-chain price"),
            }
        }
        debug!(refreshed, total = self.list.assets.len(), "Prices refreshed");
    }

    pub fn address(&self) -> Pubkey {
        self.address
    }

    pub fn list(&self) -> &AssetsList {
        &self.list
    }

    /// Mint of the settlement synthetic (xUSD).
    pub fn xusd_mint(&self) -> Result<Pubkey> {
        self.list
            .settlement_synthetic()
            .map(|s| s.asset_address)
            .ok_or(LiquidatorError::MissingAsset(0))
    }

    /// Price of a collateral or synthetic mint, collaterals first.
    pub fn price_for(&self, mint: &Pubkey) -> Option<&ScaledDecimal> {
        let index = self
            .list
            .collateral_by_mint(mint)
            .map(|c| c.asset_index)
            .or_else(|| self.list.synthetic_by_mint(mint).map(|s| s.asset_index))?;
        self.list.asset(index).map(|asset| &asset.price)
    }
}

async fn read_feed(ledger: &dyn Ledger, feed: &Pubkey) -> Result<ScaledDecimal> {
    let data = ledger
        .account_data(feed)
        .await?
        .ok_or(LiquidatorError::AccountNotFound(*feed))?;
    price_from_feed(feed, &data, ORACLE_OFFSET)
}

/// Collateral price of every vault, read once per distinct feed.
///
/// The default (all-zero) feed means a price of exactly 1. Feeds that cannot
/// be read are left out; their vaults are skipped for this pass.
pub async fn collateral_prices<'a>(
    ledger: &dyn Ledger,
    vaults: impl IntoIterator<Item = &'a Vault>,
) -> HashMap<Pubkey, ScaledDecimal> {
    let mut prices = HashMap::new();
    prices.insert(Pubkey::default(), ScaledDecimal::one(ORACLE_OFFSET));

    let feeds: Vec<Pubkey> = vaults
        .into_iter()
        .map(|v| v.collateral_price_feed)
        .filter(|feed| *feed != Pubkey::default())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let results = join_all(feeds.iter().map(|feed| read_feed(ledger, feed))).await;
    for (feed, result) in feeds.into_iter().zip(results) {
        match result {
            Ok(price) => {
                prices.insert(feed, price);
            }
            Err(e) => warn!(%feed, error = %e, "Collateral price unavailable"),
        }
    }
    prices
}
