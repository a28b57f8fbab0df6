//! Protocol snapshots shared by unit tests.
//!
//! Prices: xUSD 1.0, SNY 2.0, xBTC 50000.0 (all at `ORACLE_OFFSET`).
//! Supplies: 1000 xUSD and 0.1 xBTC, so total debt is 6000.000000.

use smallvec::smallvec;
use solana_sdk::pubkey::Pubkey;

use crate::decimal::ScaledDecimal;
use crate::state::{
    Asset, AssetsList, Collateral, CollateralEntry, ExchangeAccount, ExchangeState, Synthetic,
    Vault, VaultEntry, DEADLINE_UNSET,
};

pub const XUSD_MINT: Pubkey = Pubkey::new_from_array([1; 32]);
pub const SNY_MINT: Pubkey = Pubkey::new_from_array([2; 32]);
pub const XBTC_MINT: Pubkey = Pubkey::new_from_array([3; 32]);
pub const SNY_FEED: Pubkey = Pubkey::new_from_array([12; 32]);
pub const XBTC_FEED: Pubkey = Pubkey::new_from_array([13; 32]);
pub const ASSETS_LIST: Pubkey = Pubkey::new_from_array([20; 32]);
pub const SNY_RESERVE: Pubkey = Pubkey::new_from_array([21; 32]);
pub const SNY_LIQUIDATION_FUND: Pubkey = Pubkey::new_from_array([22; 32]);

pub fn d(s: &str) -> ScaledDecimal {
    s.parse().unwrap()
}

fn asset(feed: Pubkey, price: &str) -> Asset {
    Asset {
        feed_address: feed,
        price: d(price),
        last_update: 0,
        twap: ScaledDecimal::zero(8),
        twac: ScaledDecimal::zero(8),
        status: 0,
        confidence: ScaledDecimal::zero(8),
    }
}

fn synthetic(asset_index: u8, mint: Pubkey, supply: &str) -> Synthetic {
    let supply = d(supply);
    let scale = supply.scale();
    Synthetic {
        asset_index,
        asset_address: mint,
        supply,
        max_supply: ScaledDecimal::zero(scale),
        borrowed_supply: ScaledDecimal::zero(scale),
        swapline_supply: ScaledDecimal::zero(scale),
        settlement_slot: u64::MAX,
    }
}

pub fn assets_list() -> AssetsList {
    AssetsList {
        assets: vec![
            asset(Pubkey::default(), "1.00000000"),
            asset(SNY_FEED, "2.00000000"),
            asset(XBTC_FEED, "50000.00000000"),
        ],
        collaterals: vec![Collateral {
            asset_index: 1,
            collateral_address: SNY_MINT,
            reserve_address: SNY_RESERVE,
            liquidation_fund: SNY_LIQUIDATION_FUND,
            reserve_balance: d("0.000000"),
            collateral_ratio: d("0.50"),
            max_collateral: d("1000000.000000"),
        }],
        synthetics: vec![
            synthetic(0, XUSD_MINT, "1000.000000"),
            synthetic(2, XBTC_MINT, "0.10000000"),
        ],
    }
}

pub fn state(total_debt_shares: u64) -> ExchangeState {
    ExchangeState {
        admin: Pubkey::new_from_array([30; 32]),
        halted: false,
        nonce: 255,
        debt_shares: total_debt_shares,
        assets_list: ASSETS_LIST,
        health_factor: d("0.50"),
        max_delay: 0,
        fee: d("0.00300"),
        swap_tax_ratio: d("0.20"),
        swap_tax_reserve: d("0.000000"),
        liquidation_rate: d("0.20"),
        penalty_to_liquidator: d("0.05"),
        penalty_to_exchange: d("0.05"),
        liquidation_buffer: 2250,
        debt_interest_rate: d("0.000000000000000000"),
        accumulated_debt_interest: d("0.000000"),
        last_debt_adjustment: 0,
    }
}

/// Staking position with one SNY deposit (`collateral` raw, scale 6).
pub fn exchange_account(debt_shares: u64, collateral: u64) -> ExchangeAccount {
    ExchangeAccount {
        owner: Pubkey::new_unique(),
        version: 0,
        debt_shares,
        liquidation_deadline: DEADLINE_UNSET,
        bump: 254,
        collaterals: smallvec![CollateralEntry {
            amount: collateral,
            collateral_address: SNY_RESERVE,
            index: 0,
        }],
    }
}

/// xUSD vault backed by SNY: threshold 80%, ratio 50%, 5.5% yearly.
pub fn vault() -> Vault {
    Vault {
        halted: false,
        synthetic: XUSD_MINT,
        collateral: SNY_MINT,
        collateral_price_feed: SNY_FEED,
        oracle_type: 0,
        open_fee: d("0.000000"),
        debt_interest_rate: d("0.055000000000000000"),
        collateral_ratio: d("0.500000"),
        liquidation_threshold: d("0.800000"),
        liquidation_ratio: d("0.500000"),
        liquidation_penalty_liquidator: d("0.050000"),
        liquidation_penalty_exchange: d("0.050000"),
        accumulated_interest: d("0.000000"),
        accumulated_interest_rate: ScaledDecimal::one(18),
        collateral_reserve: Pubkey::new_from_array([40; 32]),
        liquidation_fund: Pubkey::new_from_array([41; 32]),
        mint_amount: d("0.000000"),
        collateral_amount: d("0.000000"),
        max_borrow: d("1000000.000000"),
        last_update: 0,
        vault_type: 0,
        bump: 253,
    }
}

/// Entry in `vault` with the given synthetic debt and collateral amounts.
pub fn vault_entry(vault: Pubkey, synthetic: &str, collateral: &str) -> VaultEntry {
    VaultEntry {
        owner: Pubkey::new_unique(),
        vault,
        last_accumulated_interest_rate: ScaledDecimal::one(18),
        synthetic_amount: d(synthetic),
        collateral_amount: d(collateral),
        bump: 252,
    }
}
