//! Lazy compound-interest accrual on vault debt.
//!
//! The program compounds vault interest once per adjustment period. Vault
//! accounts fetched from the chain may be several periods behind, so the
//! liquidator replays the missing periods locally before judging any entry.

use num_bigint::BigInt;
use num_integer::Integer;

use crate::config::InterestConfig;
use crate::decimal::ScaledDecimal;
use crate::error::MathError;
use crate::state::{Vault, VaultEntry};

/// Bring `vault.accumulated_interest_rate` up to `now` (unix seconds).
///
/// Only whole periods are applied; the remainder carries to the next call.
/// Returns the number of periods compounded.
pub fn accrue_vault_interest(
    vault: &mut Vault,
    now: i64,
    schedule: &InterestConfig,
) -> Result<u64, MathError> {
    if schedule.adjustment_period_secs == 0 || schedule.periods_per_year == 0 {
        return Err(MathError::DivisionByZero);
    }
    let period = schedule.adjustment_period_secs as i64;
    let periods = (now - vault.last_update).div_euclid(period);
    if periods < 1 {
        return Ok(0);
    }

    let rate = &vault.debt_interest_rate;
    let per_period = rate
        .magnitude()
        .div_floor(&BigInt::from(schedule.periods_per_year));
    let base =
        ScaledDecimal::new(per_period, rate.scale()).try_add(&ScaledDecimal::one(rate.scale()))?;
    let factor = base.pow(periods as u64);

    vault.accumulated_interest_rate = vault.accumulated_interest_rate.mul(&factor);
    vault.last_update += periods * period;
    Ok(periods as u64)
}

/// Rebase an entry's debt onto the vault's current interest index.
///
/// Debt is rounded up so the liquidator never under-states what is owed.
/// Returns the (possibly unchanged) synthetic amount.
pub fn rebase_entry_debt(vault: &Vault, entry: &mut VaultEntry) -> Result<ScaledDecimal, MathError> {
    if entry.last_accumulated_interest_rate == vault.accumulated_interest_rate {
        return Ok(entry.synthetic_amount.clone());
    }
    let ratio = vault
        .accumulated_interest_rate
        .div(&entry.last_accumulated_interest_rate)?;
    entry.synthetic_amount = entry.synthetic_amount.mul_up(&ratio);
    entry.last_accumulated_interest_rate = vault.accumulated_interest_rate.clone();
    Ok(entry.synthetic_amount.clone())
}
