//! Collateralization snapshot of every staking account.
//!
//! Read-only: nothing is flagged or liquidated. Used by the `check` mode to
//! see how close the book is to liquidations.

use std::cmp::Reverse;

use num_traits::ToPrimitive;
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};

use crate::codec::{ProgramAccount, Schema};
use crate::decimal::ScaledDecimal;
use crate::error::Result;
use crate::math::{calculate_user_debt, calculate_user_max_debt};
use crate::ports::LiquidatorContext;
use crate::prices::PriceBook;
use crate::state::{AssetsList, ExchangeAccount, ExchangeState};
use crate::synchronizer::fetch;

/// Accounts listed as closest to liquidation.
pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AccountHealth {
    pub address: Pubkey,
    pub max_debt: ScaledDecimal,
    pub debt: ScaledDecimal,
    /// `debt * 100 / max_debt`, `None` without collateral.
    pub ratio_pct: Option<u64>,
}

impl AccountHealth {
    pub fn is_underwater(&self) -> bool {
        self.debt.is_positive() && self.debt.magnitude() > self.max_debt.magnitude()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollateralizationReport {
    pub scanned: usize,
    /// Highest debt-to-limit ratios first.
    pub closest: Vec<AccountHealth>,
    /// Accounts whose debt exceeds their limit.
    pub underwater: Vec<AccountHealth>,
}

fn assess(
    state: &ExchangeState,
    list: &AssetsList,
    address: Pubkey,
    account: &ExchangeAccount,
) -> Result<AccountHealth> {
    let max_debt = calculate_user_max_debt(account, list)?;
    let debt = calculate_user_debt(state, list, account)?;
    let ratio_pct = if max_debt.is_zero() {
        None
    } else {
        let ratio = (debt.magnitude() * 100u32) / max_debt.magnitude();
        Some(ratio.to_u64().unwrap_or(u64::MAX))
    };
    Ok(AccountHealth {
        address,
        max_debt,
        debt,
        ratio_pct,
    })
}

/// Rank `accounts` by debt-to-limit ratio and collect the underwater ones.
pub fn build_report(
    state: &ExchangeState,
    list: &AssetsList,
    accounts: &[(Pubkey, ExchangeAccount)],
    top: usize,
) -> CollateralizationReport {
    let mut healths: Vec<AccountHealth> = accounts
        .iter()
        .filter_map(|(address, account)| match assess(state, list, *address, account) {
            Ok(health) => Some(health),
            Err(e) => {
                warn!(account = %address, error = %e, "Could not assess account");
                None
            }
        })
        .collect();

    let underwater = healths.iter().filter(|h| h.is_underwater()).cloned().collect();
    healths.sort_by_key(|h| Reverse(h.ratio_pct.unwrap_or(0)));
    healths.truncate(top);

    CollateralizationReport {
        scanned: accounts.len(),
        closest: healths,
        underwater,
    }
}

/// Fetch every exchange account with fresh prices and build the report.
pub async fn collateralization_report(ctx: &LiquidatorContext, top: usize) -> Result<CollateralizationReport> {
    let ledger = ctx.ledger.as_ref();
    let state = fetch::<ExchangeState>(ledger, &ctx.addresses.state).await?;
    let book = PriceBook::load(ledger, state.assets_list).await?;

    let size = Schema::ExchangeAccount.data_size().unwrap_or_default();
    let raw = ledger.program_accounts(&ctx.addresses.program, size).await?;
    let mut accounts = Vec::with_capacity(raw.len());
    for (address, data) in raw {
        accounts.push((address, ExchangeAccount::decode(&data)?));
    }
    Ok(build_report(&state, book.list(), &accounts, top))
}

impl CollateralizationReport {
    pub fn log(&self) {
        info!(scanned = self.scanned, underwater = self.underwater.len(), "Collateralization report");
        for (rank, health) in self.closest.iter().enumerate() {
            info!(
                rank = rank + 1,
                account = %health.address,
                debt = %health.debt,
                max_debt = %health.max_debt,
                ratio_pct = ?health.ratio_pct,
                "Closest to liquidation"
            );
        }
        for health in &self.underwater {
            warn!(
                account = %health.address,
                debt = %health.debt,
                max_debt = %health.max_debt,
                "Debt exceeds limit"
            );
        }
    }
}
