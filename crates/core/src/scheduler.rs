//! Risk-ordered liquidation passes.
//!
//! A pass reads every position of one kind, keeps the ones past their limit,
//! orders them by urgency and liquidates each until it is back within limits
//! or an attempt fails. Candidate-local failures are logged and skipped;
//! errors that [`LiquidatorError::is_fatal`] reports end the pass.

use std::collections::HashMap;
use std::time::Instant;

use futures::future::{join_all, try_join_all};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::ProgramAccount;
use crate::decimal::ScaledDecimal;
use crate::error::{LiquidatorError, Result};
use crate::interest::{accrue_vault_interest, rebase_entry_debt};
use crate::math::{amount_to_value, calculate_user_debt, get_amount_for_liquidation, is_liquidatable, LiquidationAmount};
use crate::plan::{staking_liquidation_plan, vault_liquidation_plan, LiquidatorAccounts};
use crate::ports::LiquidatorContext;
use crate::prices::{collateral_prices, PriceBook};
use crate::sizing::{size_vault_liquidation, staking_repay_amount, LiquidatorBalances};
use crate::state::{AssetsList, ExchangeAccount, ExchangeState, OracleType, Vault, VaultEntry};
use crate::synchronizer::{fetch, Synchronizer};

/// Upper bound on back-to-back liquidations of one position per pass.
const MAX_ATTEMPTS_PER_CANDIDATE: usize = 32;

/// Counters reported at the end of a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Positions read from the ledger
    pub scanned: usize,
    /// Positions past their limit
    pub candidates: usize,
    /// Staking accounts newly flagged with `check_account`
    pub flagged: usize,
    /// Successful liquidation transactions
    pub liquidated: usize,
    /// Vault entries whose debt exceeds their collateral
    pub toxic: usize,
    /// Candidates abandoned for this pass
    pub skipped: usize,
}

/// Result of one liquidation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    /// Position is within limits.
    Healthy,
    Liquidated,
    /// Not actionable this pass (balance, missing data).
    Skipped,
    /// The transaction was rejected.
    Failed,
    Toxic,
}

/// A vault entry past its threshold, with the debt/collateral value ratio
/// used to order candidates.
struct VaultCandidate {
    address: Pubkey,
    entry: VaultEntry,
    risk: ScaledDecimal,
}

pub struct Scheduler {
    ctx: LiquidatorContext,
}

impl Scheduler {
    pub fn new(ctx: LiquidatorContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &LiquidatorContext {
        &self.ctx
    }

    /// Read the xUSD balance and warn when it is below the configured floor.
    pub async fn check_balance(&self) -> Result<u64> {
        let state = fetch::<ExchangeState>(self.ctx.ledger.as_ref(), &self.ctx.addresses.state).await?;
        let list = fetch::<AssetsList>(self.ctx.ledger.as_ref(), &state.assets_list).await?;
        let mint = list
            .settlement_synthetic()
            .map(|s| s.asset_address)
            .ok_or(LiquidatorError::MissingAsset(0))?;
        let account = self.ctx.exchange.token_account(&mint).await?;
        let balance = self.ctx.ledger.token_balance(&account).await?;

        let threshold = self.ctx.config.liquidation.low_balance_warning;
        if balance < threshold {
            warn!(balance, threshold, account = %account, "Account is low on xUSD");
        } else {
            info!(balance, account = %account, "xUSD balance");
        }
        Ok(balance)
    }

    /// Liquidate staking (exchange) accounts whose debt exceeds their limit.
    #[instrument(skip(self))]
    pub async fn staking_pass(&self) -> Result<PassSummary> {
        let started = Instant::now();
        let mut summary = PassSummary::default();
        let ledger = self.ctx.ledger.as_ref();

        let state = Synchronizer::<ExchangeState>::build(&self.ctx.ledger, self.ctx.addresses.state).await?;
        let book = PriceBook::load(ledger, state.latest()?.assets_list).await?;

        let collateral_accounts = try_join_all(
            book.list()
                .collaterals
                .iter()
                .map(|c| self.ctx.exchange.token_account(&c.collateral_address)),
        )
        .await?;
        let xusd_account = self.ctx.exchange.token_account(&book.xusd_mint()?).await?;
        let mut balance = ledger.token_balance(&xusd_account).await?;

        let at_risk = self
            .accounts_at_risk(&state.latest()?, book.list(), &mut summary)
            .await?;
        let candidates = self.follow(at_risk, &mut summary).await?;

        let slot = ledger.slot().await?;
        info!(count = candidates.len(), slot, "Liquidating suitable accounts");

        for candidate in &candidates {
            let deadline = candidate.latest()?.liquidation_deadline;
            // sorted by deadline, nothing after this one is due
            if slot < deadline {
                debug!(account = %candidate.address(), deadline, slot, "Deadline not reached");
                break;
            }

            for _ in 0..MAX_ATTEMPTS_PER_CANDIDATE {
                let state_now = state.latest()?;
                let attempt = self
                    .liquidate_staking(&state_now, &book, candidate, &collateral_accounts, balance, xusd_account)
                    .await;
                match settle(attempt, candidate.address(), &mut summary)? {
                    Attempt::Liquidated => {}
                    _ => break,
                }
                if let Err(e) = candidate.refresh(ledger).await {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(account = %candidate.address(), error = %e, "Could not re-read account");
                    break;
                }
                match ledger.token_balance(&xusd_account).await {
                    Ok(fresh) => balance = fresh,
                    Err(e) => {
                        warn!(account = %candidate.address(), error = %e, "Could not re-read xUSD balance");
                        break;
                    }
                }
            }
        }

        info!(
            scanned = summary.scanned,
            at_risk = summary.candidates,
            flagged = summary.flagged,
            liquidated = summary.liquidated,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Staking pass finished"
        );
        Ok(summary)
    }

    /// Every liquidatable exchange account, flagged and sorted by deadline.
    async fn accounts_at_risk(
        &self,
        state: &ExchangeState,
        list: &AssetsList,
        summary: &mut PassSummary,
    ) -> Result<Vec<(Pubkey, ExchangeAccount)>> {
        let accounts = self.program_accounts::<ExchangeAccount>().await?;
        summary.scanned = accounts.len();

        let mut at_risk = Vec::new();
        for (address, account) in accounts {
            match is_liquidatable(state, list, &account) {
                Ok(true) => at_risk.push((address, account)),
                Ok(false) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(account = %address, error = %e, "Could not assess account"),
            }
        }
        summary.candidates = at_risk.len();

        let mut checked = Vec::with_capacity(at_risk.len());
        for (address, mut account) in at_risk {
            if !account.deadline_is_set() {
                match self.ctx.exchange.check_account(&address).await {
                    Ok(signature) => {
                        debug!(account = %address, %signature, "Flagged account");
                        summary.flagged += 1;
                        match fetch::<ExchangeAccount>(self.ctx.ledger.as_ref(), &address).await {
                            Ok(flagged) => account = flagged,
                            Err(e) if e.is_fatal() => return Err(e),
                            Err(e) => {
                                warn!(account = %address, error = %e, "Could not re-read flagged account");
                                summary.skipped += 1;
                                continue;
                            }
                        }
                    }
                    Err(e) => warn!(account = %address, error = %e, "check_account failed"),
                }
            }
            checked.push((address, account));
        }
        let mut at_risk = checked;

        at_risk.sort_by_key(|(_, account)| account.liquidation_deadline);
        info!(
            at_risk = at_risk.len(),
            flagged = summary.flagged,
            "Found accounts at risk"
        );
        Ok(at_risk)
    }

    /// Subscribe to every candidate. A candidate whose subscription cannot be
    /// opened is skipped for this pass.
    async fn follow(
        &self,
        at_risk: Vec<(Pubkey, ExchangeAccount)>,
        summary: &mut PassSummary,
    ) -> Result<Vec<Synchronizer<ExchangeAccount>>> {
        let ledger = &self.ctx.ledger;
        let opened = join_all(at_risk.into_iter().map(|(address, account)| async move {
            (address, Synchronizer::with_initial(ledger, address, account).await)
        }))
        .await;

        let mut candidates = Vec::with_capacity(opened.len());
        for (address, result) in opened {
            match result {
                Ok(sync) => candidates.push(sync),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(account = %address, error = %e, "Could not follow account");
                    summary.skipped += 1;
                }
            }
        }
        Ok(candidates)
    }

    async fn liquidate_staking(
        &self,
        state: &ExchangeState,
        book: &PriceBook,
        candidate: &Synchronizer<ExchangeAccount>,
        collateral_accounts: &[Pubkey],
        xusd_balance: u64,
        xusd_account: Pubkey,
    ) -> Result<Attempt> {
        let list = book.list();
        let account = candidate.latest()?;
        if !is_liquidatable(state, list, &account)? {
            return Ok(Attempt::Healthy);
        }
        let Some(entry) = account.collaterals.first() else {
            return Ok(Attempt::Healthy);
        };
        let collateral = list
            .collaterals
            .get(entry.index as usize)
            .ok_or(LiquidatorError::MissingAsset(entry.index))?;
        let liquidator_collateral = collateral_accounts
            .get(entry.index as usize)
            .copied()
            .ok_or(LiquidatorError::MissingAsset(entry.index))?;

        let debt = calculate_user_debt(state, list, &account)?;
        let amount = match staking_repay_amount(
            &debt,
            &state.liquidation_rate,
            xusd_balance,
            &self.ctx.config.liquidation,
        ) {
            Ok(amount) => amount,
            Err(e @ LiquidatorError::InsufficientBalance { .. }) => {
                error!(account = %candidate.address(), error = %e, "xUSD account is empty");
                return Ok(Attempt::Skipped);
            }
            Err(e) => return Err(e),
        };

        let plan = staking_liquidation_plan(
            book.address(),
            list,
            candidate.address(),
            collateral,
            amount,
            xusd_account,
            liquidator_collateral,
        );
        match self.ctx.exchange.execute(&plan).await {
            Ok(signature) => {
                info!(account = %candidate.address(), debt = %debt, amount = ?amount, %signature, "Liquidated account");
                Ok(Attempt::Liquidated)
            }
            Err(e) => {
                error!(account = %candidate.address(), error = %e, "Liquidation failed");
                Ok(Attempt::Failed)
            }
        }
    }

    /// Liquidate vault entries past their vault's liquidation threshold.
    #[instrument(skip(self))]
    pub async fn vault_pass(&self) -> Result<PassSummary> {
        let started = Instant::now();
        let mut summary = PassSummary::default();
        let ledger = self.ctx.ledger.as_ref();

        let state = fetch::<ExchangeState>(ledger, &self.ctx.addresses.state).await?;
        let book = PriceBook::load(ledger, state.assets_list).await?;
        let xusd_mint = book.xusd_mint()?;

        let entries = self.program_accounts::<VaultEntry>().await?;
        let mut vaults: HashMap<Pubkey, Vault> =
            self.program_accounts::<Vault>().await?.into_iter().collect();
        info!(entries = entries.len(), vaults = vaults.len(), "Fetched vaults");

        for (address, vault) in &vaults {
            OracleType::try_from(vault.oracle_type).map_err(|oracle_type| {
                LiquidatorError::UnsupportedOracleType {
                    vault: *address,
                    oracle_type,
                }
            })?;
        }

        let now = chrono::Utc::now().timestamp();
        let mut unusable = Vec::new();
        for (address, vault) in vaults.iter_mut() {
            match accrue_vault_interest(vault, now, &self.ctx.config.interest) {
                Ok(0) => {}
                Ok(periods) => {
                    debug!(vault = %address, periods, index = %vault.accumulated_interest_rate, "Accrued interest");
                }
                Err(e) => {
                    let e = LiquidatorError::from(e);
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(vault = %address, error = %e, "Could not accrue interest, skipping vault");
                    unusable.push(*address);
                }
            }
        }
        // entries of these vaults count as unknown
        for address in &unusable {
            vaults.remove(address);
        }
        let prices = collateral_prices(ledger, vaults.values()).await;

        let mut candidates = Vec::new();
        for (address, entry) in entries {
            let Some(vault) = vaults.get(&entry.vault) else {
                continue;
            };
            summary.scanned += 1;
            match self.assess_entry(&book, vault, &prices, address, entry) {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(entry = %address, error = %e, "Could not assess vault entry");
                    summary.skipped += 1;
                }
            }
        }
        // highest debt-to-collateral first
        candidates.sort_by(|a, b| b.risk.magnitude().cmp(a.risk.magnitude()));
        summary.candidates = candidates.len();
        info!(count = candidates.len(), "Liquidating vault entries");

        for candidate in candidates {
            let Some(vault) = vaults.get(&candidate.entry.vault) else {
                continue;
            };
            let Some(collateral_price) = prices.get(&vault.collateral_price_feed) else {
                continue;
            };
            let sync = match Synchronizer::with_initial(&self.ctx.ledger, candidate.address, candidate.entry).await {
                Ok(sync) => sync,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(entry = %candidate.address, error = %e, "Could not follow vault entry");
                    summary.skipped += 1;
                    continue;
                }
            };

            for _ in 0..MAX_ATTEMPTS_PER_CANDIDATE {
                let attempt = self
                    .liquidate_vault(&book, vault, collateral_price, &sync, xusd_mint)
                    .await;
                match settle(attempt, sync.address(), &mut summary)? {
                    Attempt::Liquidated => {}
                    _ => break,
                }
                if let Err(e) = sync.refresh(ledger).await {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(entry = %sync.address(), error = %e, "Could not re-read vault entry");
                    break;
                }
            }
        }

        info!(
            scanned = summary.scanned,
            candidates = summary.candidates,
            liquidated = summary.liquidated,
            toxic = summary.toxic,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Vault pass finished"
        );
        Ok(summary)
    }

    /// Rebase and judge one entry. `None` when it needs no liquidation.
    fn assess_entry(
        &self,
        book: &PriceBook,
        vault: &Vault,
        prices: &HashMap<Pubkey, ScaledDecimal>,
        address: Pubkey,
        mut entry: VaultEntry,
    ) -> Result<Option<VaultCandidate>> {
        let collateral_price = prices
            .get(&vault.collateral_price_feed)
            .ok_or(LiquidatorError::StalePrice(vault.collateral_price_feed))?;
        let synthetic_price = book
            .price_for(&vault.synthetic)
            .ok_or(LiquidatorError::StalePrice(vault.synthetic))?;

        rebase_entry_debt(vault, &mut entry)?;
        let outcome = get_amount_for_liquidation(
            &entry,
            vault,
            collateral_price,
            synthetic_price,
            &self.ctx.config.liquidation.dust(),
        )?;
        if outcome == LiquidationAmount::Healthy {
            return Ok(None);
        }

        let debt_value = amount_to_value(&entry.synthetic_amount, synthetic_price)?;
        let collateral_value = amount_to_value(&entry.collateral_amount, collateral_price)?;
        let risk = if collateral_value.is_zero() {
            ScaledDecimal::new(u64::MAX, debt_value.scale())
        } else {
            debt_value.div(&collateral_value)?
        };
        Ok(Some(VaultCandidate {
            address,
            entry,
            risk,
        }))
    }

    async fn liquidate_vault(
        &self,
        book: &PriceBook,
        vault: &Vault,
        collateral_price: &ScaledDecimal,
        sync: &Synchronizer<VaultEntry>,
        xusd_mint: Pubkey,
    ) -> Result<Attempt> {
        let mut entry = sync.latest()?;
        rebase_entry_debt(vault, &mut entry)?;
        let synthetic_price = book
            .price_for(&vault.synthetic)
            .ok_or(LiquidatorError::StalePrice(vault.synthetic))?;

        let max_amount = match get_amount_for_liquidation(
            &entry,
            vault,
            collateral_price,
            synthetic_price,
            &self.ctx.config.liquidation.dust(),
        )? {
            LiquidationAmount::Healthy => return Ok(Attempt::Healthy),
            LiquidationAmount::Toxic => {
                warn!(
                    entry = %sync.address(),
                    owner = %entry.owner,
                    debt = %entry.synthetic_amount,
                    collateral = %entry.collateral_amount,
                    "Toxic vault entry, debt exceeds collateral"
                );
                return Ok(Attempt::Toxic);
            }
            LiquidationAmount::Full(amount) | LiquidationAmount::Partial(amount) => amount,
        };

        let exchange = &self.ctx.exchange;
        let (xusd_account, synthetic_account, collateral_account) = futures::try_join!(
            exchange.token_account(&xusd_mint),
            exchange.token_account(&vault.synthetic),
            exchange.token_account(&vault.collateral),
        )?;
        let (xusd, synthetic) = futures::try_join!(
            self.ctx.ledger.token_balance(&xusd_account),
            self.ctx.ledger.token_balance(&synthetic_account),
        )?;

        let sizing = match size_vault_liquidation(
            &max_amount,
            synthetic_price,
            vault.synthetic == xusd_mint,
            LiquidatorBalances { xusd, synthetic },
            &self.ctx.config.liquidation,
        ) {
            Ok(sizing) => sizing,
            Err(e @ LiquidatorError::InsufficientBalance { .. }) => {
                warn!(entry = %sync.address(), error = %e, "Cannot afford vault liquidation");
                return Ok(Attempt::Skipped);
            }
            Err(e) => return Err(e),
        };
        debug!(
            entry = %sync.address(),
            amount = %sizing.amount,
            limited = sizing.limited,
            swap_in = ?sizing.swap_in,
            "Sized vault liquidation"
        );

        let plan = vault_liquidation_plan(
            book.address(),
            book.list(),
            vault,
            entry.owner,
            xusd_mint,
            &sizing,
            LiquidatorAccounts {
                xusd: xusd_account,
                synthetic: synthetic_account,
                collateral: collateral_account,
            },
        );
        match self.ctx.exchange.execute(&plan).await {
            Ok(signature) => {
                info!(entry = %sync.address(), amount = %sizing.amount, limited = sizing.limited, %signature, "Liquidated vault entry");
                Ok(Attempt::Liquidated)
            }
            Err(e) => {
                error!(entry = %sync.address(), error = %e, "Vault liquidation failed");
                Ok(Attempt::Failed)
            }
        }
    }

    /// Decode every program account of `T`'s fixed size.
    async fn program_accounts<T: ProgramAccount>(&self) -> Result<Vec<(Pubkey, T)>> {
        let size = T::SCHEMA
            .data_size()
            .ok_or_else(|| anyhow::anyhow!("{:?} has no fixed size", T::SCHEMA))?;
        let raw = self
            .ctx
            .ledger
            .program_accounts(&self.ctx.addresses.program, size)
            .await?;
        raw.into_iter()
            .map(|(address, data)| -> Result<(Pubkey, T)> { Ok((address, T::decode(&data)?)) })
            .collect()
    }
}

/// Fold an attempt into the summary. Fatal errors propagate, other errors
/// skip the candidate.
fn settle(attempt: Result<Attempt>, address: Pubkey, summary: &mut PassSummary) -> Result<Attempt> {
    let attempt = match attempt {
        Ok(attempt) => attempt,
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            warn!(%address, error = %e, "Skipping candidate");
            Attempt::Skipped
        }
    };
    match attempt {
        Attempt::Liquidated => summary.liquidated += 1,
        Attempt::Skipped | Attempt::Failed => summary.skipped += 1,
        Attempt::Toxic => summary.toxic += 1,
        Attempt::Healthy => {}
    }
    Ok(attempt)
}
