//! Eligibility and sizing math for staking accounts and vault entries.
//!
//! Values are quoted at [`ACCURACY`] decimals; oracle prices carry
//! [`ORACLE_OFFSET`] decimals.

use num_bigint::BigInt;
use num_integer::Integer;

use crate::decimal::{ten_to, ScaledDecimal};
use crate::error::{LiquidatorError, MathError, Result};
use crate::state::{AssetsList, ExchangeAccount, ExchangeState, Vault, VaultEntry};

/// Decimals of every price-denominated value.
pub const ACCURACY: u8 = 6;
/// Decimals of oracle prices stored in the assets list.
pub const ORACLE_OFFSET: u8 = 8;

/// Convert an asset amount to its value at [`ACCURACY`] decimals.
pub fn amount_to_value(amount: &ScaledDecimal, price: &ScaledDecimal) -> Result<ScaledDecimal, MathError> {
    let product = amount.magnitude() * price.magnitude();
    let shift = amount.scale() as i32 + price.scale() as i32 - ACCURACY as i32;
    let value = if shift >= 0 {
        product.div_floor(&pow10(shift)?)
    } else {
        product * pow10(-shift)?
    };
    Ok(ScaledDecimal::new(value, ACCURACY))
}

/// `10^exp` for a non-negative scale difference.
fn pow10(exp: i32) -> Result<BigInt, MathError> {
    let exp = u8::try_from(exp).map_err(|_| MathError::Overflow("scale"))?;
    Ok(ten_to(exp))
}

/// Convert a value back into an amount with `target_scale` decimals.
pub fn value_to_amount(
    value: &ScaledDecimal,
    price: &ScaledDecimal,
    target_scale: u8,
) -> Result<ScaledDecimal, MathError> {
    if price.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let shift = target_scale as i32 + price.scale() as i32 - value.scale() as i32;
    let amount = if shift >= 0 {
        (value.magnitude() * pow10(shift)?).div_floor(price.magnitude())
    } else {
        let denominator: BigInt = price.magnitude() * pow10(-shift)?;
        value.magnitude().div_floor(&denominator)
    };
    Ok(ScaledDecimal::new(amount, target_scale))
}

/// Largest synthetic debt (in synthetic units) the collateral supports at `ratio`.
pub fn calculate_borrow_limit(
    collateral_amount: &ScaledDecimal,
    collateral_price: &ScaledDecimal,
    ratio: &ScaledDecimal,
    synthetic_price: &ScaledDecimal,
    synthetic_scale: u8,
) -> Result<ScaledDecimal, MathError> {
    let max_debt_value = amount_to_value(collateral_amount, collateral_price)?.mul(ratio);
    value_to_amount(&max_debt_value, synthetic_price, synthetic_scale)
}

/// Total value of outstanding synthetic debt across the exchange.
pub fn calculate_debt(assets_list: &AssetsList) -> Result<ScaledDecimal> {
    let mut total = ScaledDecimal::zero(ACCURACY);
    for synthetic in &assets_list.synthetics {
        let asset = assets_list
            .asset(synthetic.asset_index)
            .ok_or(LiquidatorError::MissingAsset(synthetic.asset_index))?;
        let outstanding = synthetic
            .supply
            .try_sub(&synthetic.borrowed_supply)?
            .try_sub(&synthetic.swapline_supply)?;
        total = total.try_add(&amount_to_value(&outstanding, &asset.price)?)?;
    }
    Ok(total)
}

/// Collateral-backed debt ceiling of a staking account.
pub fn calculate_user_max_debt(
    account: &ExchangeAccount,
    assets_list: &AssetsList,
) -> Result<ScaledDecimal> {
    let mut total = ScaledDecimal::zero(ACCURACY);
    for entry in &account.collaterals {
        let collateral = assets_list
            .collaterals
            .get(entry.index as usize)
            .ok_or(LiquidatorError::MissingAsset(entry.index))?;
        let asset = assets_list
            .asset(collateral.asset_index)
            .ok_or(LiquidatorError::MissingAsset(collateral.asset_index))?;
        let amount = ScaledDecimal::from_u64(entry.amount, collateral.reserve_balance.scale());
        let value = amount_to_value(&amount, &asset.price)?.mul(&collateral.collateral_ratio);
        total = total.try_add(&value)?;
    }
    Ok(total)
}

/// The account's share of total debt: `debt_shares * total_debt / state.debt_shares`.
pub fn calculate_user_debt(
    state: &ExchangeState,
    assets_list: &AssetsList,
    account: &ExchangeAccount,
) -> Result<ScaledDecimal> {
    if state.debt_shares == 0 {
        return Err(MathError::DivisionByZero.into());
    }
    let debt = calculate_debt(assets_list)?;
    let share = (debt.magnitude() * BigInt::from(account.debt_shares))
        .div_floor(&BigInt::from(state.debt_shares));
    Ok(ScaledDecimal::new(share, ACCURACY))
}

pub fn is_liquidatable(
    state: &ExchangeState,
    assets_list: &AssetsList,
    account: &ExchangeAccount,
) -> Result<bool> {
    if account.debt_shares == 0 {
        return Ok(false);
    }
    let max_debt = calculate_user_max_debt(account, assets_list)?;
    let debt = calculate_user_debt(state, assets_list, account)?;
    Ok(debt.try_cmp(&max_debt)?.is_gt())
}

/// Outcome of sizing a vault entry for liquidation.
#[derive(Debug, Clone, PartialEq)]
pub enum LiquidationAmount {
    /// Debt is within the liquidation threshold.
    Healthy,
    /// Debt value exceeds collateral value; needs protocol intervention.
    Toxic,
    /// Dust position, repay everything.
    Full(ScaledDecimal),
    /// Repay `synthetic_amount * liquidation_ratio`.
    Partial(ScaledDecimal),
}

impl LiquidationAmount {
    pub fn amount(&self) -> Option<&ScaledDecimal> {
        match self {
            LiquidationAmount::Full(amount) | LiquidationAmount::Partial(amount) => Some(amount),
            LiquidationAmount::Healthy | LiquidationAmount::Toxic => None,
        }
    }
}

/// Size the liquidation of a (rebased) vault entry.
///
/// `dust_value` is the debt value at [`ACCURACY`] below which the whole debt
/// is repaid in one go.
pub fn get_amount_for_liquidation(
    entry: &VaultEntry,
    vault: &Vault,
    collateral_price: &ScaledDecimal,
    synthetic_price: &ScaledDecimal,
    dust_value: &ScaledDecimal,
) -> Result<LiquidationAmount, MathError> {
    let debt = &entry.synthetic_amount;
    let limit = calculate_borrow_limit(
        &entry.collateral_amount,
        collateral_price,
        &vault.liquidation_threshold,
        synthetic_price,
        debt.scale(),
    )?;
    if debt.try_cmp(&limit)?.is_le() {
        return Ok(LiquidationAmount::Healthy);
    }

    let debt_value = amount_to_value(debt, synthetic_price)?;
    let collateral_value = amount_to_value(&entry.collateral_amount, collateral_price)?;
    if debt_value.try_cmp(&collateral_value)?.is_gt() {
        return Ok(LiquidationAmount::Toxic);
    }

    if debt_value.try_cmp(dust_value)?.is_lt() {
        return Ok(LiquidationAmount::Full(debt.clone()));
    }

    let partial = debt.mul(&vault.liquidation_ratio);
    if partial.is_zero() {
        return Ok(LiquidationAmount::Full(debt.clone()));
    }
    Ok(LiquidationAmount::Partial(partial))
}
