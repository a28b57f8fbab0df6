//! Sizing of liquidation transactions against the liquidator's own balances.

use crate::config::LiquidationConfig;
use crate::decimal::ScaledDecimal;
use crate::error::{LiquidatorError, Result};
use crate::math::{amount_to_value, value_to_amount, ACCURACY};

const BPS: u64 = 10_000;

/// Amount passed to a liquidation instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepayAmount {
    /// Let the program repay as much as it allows (`u64::MAX` on the wire).
    Max,
    Exact(u64),
}

impl RepayAmount {
    pub fn raw(self) -> u64 {
        match self {
            RepayAmount::Max => u64::MAX,
            RepayAmount::Exact(amount) => amount,
        }
    }
}

/// Repay amount for a staking liquidation.
///
/// The protocol allows repaying `user_debt * liquidation_rate`; a small
/// margin is shaved off for debt drift between the scan and execution. When
/// the balance covers that need the sentinel is sent instead of an exact
/// figure.
pub fn staking_repay_amount(
    user_debt: &ScaledDecimal,
    liquidation_rate: &ScaledDecimal,
    xusd_balance: u64,
    cfg: &LiquidationConfig,
) -> Result<RepayAmount> {
    let max_liquidate = user_debt.mul(liquidation_rate);
    let needed = max_liquidate
        .mul_ratio(BPS.saturating_sub(cfg.debt_drift_margin_bps), BPS)?
        .to_u64()?;

    if xusd_balance >= needed {
        return Ok(RepayAmount::Max);
    }
    if xusd_balance == 0 {
        return Err(LiquidatorError::InsufficientBalance {
            needed,
            available: 0,
        });
    }
    tracing::warn!(needed, balance = xusd_balance, "xUSD balance too low, repaying what is held");
    Ok(RepayAmount::Exact(xusd_balance))
}

/// Liquidator token balances relevant to one vault liquidation (raw units).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidatorBalances {
    pub xusd: u64,
    pub synthetic: u64,
}

/// Sized vault liquidation.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultSizing {
    /// Synthetic amount the liquidation is built for.
    pub amount: ScaledDecimal,
    /// The amount was capped by what the liquidator can afford.
    pub limited: bool,
    /// xUSD to swap into the synthetic first, if any.
    pub swap_in: Option<u64>,
    pub repay: RepayAmount,
}

/// Most synthetic the liquidator can put up: its synthetic balance plus its
/// xUSD converted at `synthetic_price` minus a slippage haircut.
pub fn max_affordable(
    synthetic_price: &ScaledDecimal,
    synthetic_scale: u8,
    settlement_is_synthetic: bool,
    balances: LiquidatorBalances,
    cfg: &LiquidationConfig,
) -> Result<u64> {
    if settlement_is_synthetic {
        return Ok(balances.xusd);
    }
    let xusd_value = ScaledDecimal::from_u64(balances.xusd, ACCURACY);
    let converted = value_to_amount(&xusd_value, synthetic_price, synthetic_scale)?
        .mul_ratio(BPS, BPS + cfg.affordability_haircut_bps)?
        .to_u64()?;
    Ok(converted.saturating_add(balances.synthetic))
}

/// Size a vault liquidation of up to `max_amount` synthetic units.
pub fn size_vault_liquidation(
    max_amount: &ScaledDecimal,
    synthetic_price: &ScaledDecimal,
    settlement_is_synthetic: bool,
    balances: LiquidatorBalances,
    cfg: &LiquidationConfig,
) -> Result<VaultSizing> {
    let scale = max_amount.scale();
    let affordable = max_affordable(
        synthetic_price,
        scale,
        settlement_is_synthetic,
        balances,
        cfg,
    )?;
    let limited = ScaledDecimal::from_u64(affordable, scale).try_cmp(max_amount)?.is_lt();
    let amount = if limited {
        ScaledDecimal::from_u64(affordable, scale)
    } else {
        max_amount.clone()
    };
    if amount.is_zero() {
        return Err(LiquidatorError::InsufficientBalance {
            needed: max_amount.to_u64()?,
            available: 0,
        });
    }

    let mut swap_in = None;
    if !settlement_is_synthetic {
        let needed = amount
            .mul_ratio(BPS + cfg.swap_buffer_bps, BPS)?
            .try_sub(&ScaledDecimal::from_u64(balances.synthetic, scale))?;
        if needed.is_positive() {
            let swap_value = amount_to_value(&needed, synthetic_price)?.to_u64()?;
            let swap_amount = if swap_value > cfg.min_swap_value {
                swap_value
            } else {
                cfg.min_swap_value + 1
            };
            if swap_amount > balances.xusd {
                return Err(LiquidatorError::InsufficientBalance {
                    needed: swap_amount,
                    available: balances.xusd,
                });
            }
            swap_in = Some(if limited { balances.xusd } else { swap_amount });
        }
    }

    let repay = if limited {
        RepayAmount::Exact(amount.to_u64()?)
    } else {
        RepayAmount::Max
    };
    Ok(VaultSizing {
        amount,
        limited,
        swap_in,
        repay,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, d};
    use crate::math::{get_amount_for_liquidation, LiquidationAmount};
    use solana_sdk::pubkey::Pubkey;

    fn cfg() -> LiquidationConfig {
        LiquidationConfig::default()
    }

    #[test]
    fn test_staking_repay_sentinel_when_covered() {
        // 600 debt * 20% = 120, minus 0.1% = 119.88
        let repay = staking_repay_amount(&d("600.000000"), &d("0.20"), 119_880_000, &cfg()).unwrap();
        assert_eq!(repay, RepayAmount::Max);
        assert_eq!(repay.raw(), u64::MAX);
    }

    #[test]
    fn test_staking_repay_uses_partial_balance() {
        let repay = staking_repay_amount(&d("600.000000"), &d("0.20"), 119_879_999, &cfg()).unwrap();
        assert_eq!(repay, RepayAmount::Exact(119_879_999));
    }

    #[test]
    fn test_staking_repay_empty_balance() {
        let err = staking_repay_amount(&d("600.000000"), &d("0.20"), 0, &cfg()).unwrap_err();
        assert!(matches!(
            err,
            LiquidatorError::InsufficientBalance {
                needed: 119_880_000,
                available: 0
            }
        ));
    }

    #[test]
    fn test_vault_unlimited_with_swap() {
        // 1 xBTC-like synthetic at 100.0, need 0.5 units
        let sizing = size_vault_liquidation(
            &d("0.500000"),
            &d("100.00000000"),
            false,
            LiquidatorBalances {
                xusd: 1_000_000_000,
                synthetic: 0,
            },
            &cfg(),
        )
        .unwrap();
        assert!(!sizing.limited);
        assert_eq!(sizing.repay, RepayAmount::Max);
        // 0.51 units * 100 = 51 xUSD
        assert_eq!(sizing.swap_in, Some(51_000_000));
    }

    #[test]
    fn test_vault_swap_floor_at_minimum_value() {
        let sizing = size_vault_liquidation(
            &d("0.000001"),
            &d("100.00000000"),
            false,
            LiquidatorBalances {
                xusd: 1_000_000,
                synthetic: 0,
            },
            &cfg(),
        )
        .unwrap();
        assert_eq!(sizing.swap_in, Some(1_001));
    }

    #[test]
    fn test_vault_skips_swap_when_synthetic_held() {
        let sizing = size_vault_liquidation(
            &d("0.500000"),
            &d("100.00000000"),
            false,
            LiquidatorBalances {
                xusd: 0,
                synthetic: 600_000,
            },
            &cfg(),
        )
        .unwrap();
        assert!(!sizing.limited);
        assert_eq!(sizing.swap_in, None);
    }

    #[test]
    fn test_vault_limited_by_affordability() {
        // 10.3 xUSD -> 0.1 units after the 3% haircut
        let sizing = size_vault_liquidation(
            &d("0.500000"),
            &d("100.00000000"),
            false,
            LiquidatorBalances {
                xusd: 10_300_000,
                synthetic: 0,
            },
            &cfg(),
        )
        .unwrap();
        assert!(sizing.limited);
        assert_eq!(sizing.amount, d("0.100000"));
        assert_eq!(sizing.repay, RepayAmount::Exact(100_000));
        // limited liquidations swap the whole xUSD balance
        assert_eq!(sizing.swap_in, Some(10_300_000));
    }

    #[test]
    fn test_vault_settlement_is_synthetic() {
        let sizing = size_vault_liquidation(
            &d("85.000000"),
            &d("1.00000000"),
            true,
            LiquidatorBalances {
                xusd: 30_000_000,
                synthetic: 30_000_000,
            },
            &cfg(),
        )
        .unwrap();
        assert!(sizing.limited);
        assert_eq!(sizing.amount, d("30.000000"));
        assert_eq!(sizing.swap_in, None);
    }

    #[test]
    fn test_vault_nothing_affordable() {
        let err = size_vault_liquidation(
            &d("85.000000"),
            &d("1.00000000"),
            true,
            LiquidatorBalances {
                xusd: 0,
                synthetic: 0,
            },
            &cfg(),
        )
        .unwrap_err();
        assert!(matches!(err, LiquidatorError::InsufficientBalance { .. }));
    }

    /// Repeated affordability-limited passes keep shrinking the position
    /// until it is back under the threshold.
    #[test]
    fn test_limited_liquidations_converge() {
        let vault = fixtures::vault();
        let collateral_price = d("2.00000000");
        let synthetic_price = d("1.00000000");
        let mut entry = fixtures::vault_entry(Pubkey::new_unique(), "170.000000", "100.000000");
        let balances = LiquidatorBalances {
            xusd: 30_000_000,
            synthetic: 30_000_000,
        };

        let mut rounds = 0;
        loop {
            let outcome = get_amount_for_liquidation(
                &entry,
                &vault,
                &collateral_price,
                &synthetic_price,
                &cfg().dust(),
            )
            .unwrap();
            let max_amount = match outcome {
                LiquidationAmount::Healthy => break,
                LiquidationAmount::Toxic => panic!("position turned toxic"),
                LiquidationAmount::Full(a) | LiquidationAmount::Partial(a) => a,
            };
            let sizing =
                size_vault_liquidation(&max_amount, &synthetic_price, true, balances, &cfg())
                    .unwrap();
            assert!(sizing.amount.is_positive());

            // program seizes repaid value plus a 10% penalty in collateral
            let seized_value = amount_to_value(&sizing.amount, &synthetic_price)
                .unwrap()
                .mul_ratio(110, 100)
                .unwrap();
            let seized = value_to_amount(&seized_value, &collateral_price, 6).unwrap();
            entry.synthetic_amount = entry.synthetic_amount.try_sub(&sizing.amount).unwrap();
            entry.collateral_amount = entry.collateral_amount.try_sub(&seized).unwrap();

            rounds += 1;
            assert!(rounds < 10, "did not converge");
        }
        assert!(rounds >= 2);
    }
}
