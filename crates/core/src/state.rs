//! Decoded snapshots of the exchange program's accounts.
//!
//! Every record here is a plain value decoded from an account blob by
//! [`crate::codec`]. The liquidator only mutates local copies (interest
//! accrual, price refresh); the on-chain program stays the source of truth.

use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;

use crate::decimal::ScaledDecimal;

/// Slot sentinel stored in `liquidation_deadline` before an account is flagged.
pub const DEADLINE_UNSET: u64 = u64::MAX;

/// Oracle variants a vault can reference for its collateral price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OracleType {
    Pyth = 0,
}

impl TryFrom<u8> for OracleType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(OracleType::Pyth),
            other => Err(other),
        }
    }
}

/// Global exchange state (`statev1` PDA).
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeState {
    pub admin: Pubkey,
    pub halted: bool,
    pub nonce: u8,
    /// Total debt shares across every exchange account.
    pub debt_shares: u64,
    pub assets_list: Pubkey,
    pub health_factor: ScaledDecimal,
    pub max_delay: u32,
    pub fee: ScaledDecimal,
    pub swap_tax_ratio: ScaledDecimal,
    pub swap_tax_reserve: ScaledDecimal,
    /// Fraction of a user's debt repayable in one liquidation.
    pub liquidation_rate: ScaledDecimal,
    pub penalty_to_liquidator: ScaledDecimal,
    pub penalty_to_exchange: ScaledDecimal,
    /// Grace period in slots between flagging and liquidation.
    pub liquidation_buffer: u32,
    pub debt_interest_rate: ScaledDecimal,
    pub accumulated_debt_interest: ScaledDecimal,
    pub last_debt_adjustment: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub feed_address: Pubkey,
    /// Oracle price at `ORACLE_OFFSET` scale.
    pub price: ScaledDecimal,
    pub last_update: u64,
    pub twap: ScaledDecimal,
    pub twac: ScaledDecimal,
    pub status: u8,
    pub confidence: ScaledDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collateral {
    pub asset_index: u8,
    pub collateral_address: Pubkey,
    pub reserve_address: Pubkey,
    pub liquidation_fund: Pubkey,
    pub reserve_balance: ScaledDecimal,
    pub collateral_ratio: ScaledDecimal,
    pub max_collateral: ScaledDecimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthetic {
    pub asset_index: u8,
    pub asset_address: Pubkey,
    pub supply: ScaledDecimal,
    pub max_supply: ScaledDecimal,
    pub borrowed_supply: ScaledDecimal,
    pub swapline_supply: ScaledDecimal,
    pub settlement_slot: u64,
}

/// Registry of assets, collaterals and synthetics, truncated to their heads.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetsList {
    pub assets: Vec<Asset>,
    pub collaterals: Vec<Collateral>,
    pub synthetics: Vec<Synthetic>,
}

impl AssetsList {
    /// The settlement synthetic (xUSD) always sits at index 0.
    pub fn settlement_synthetic(&self) -> Option<&Synthetic> {
        self.synthetics.first()
    }

    pub fn asset(&self, index: u8) -> Option<&Asset> {
        self.assets.get(index as usize)
    }

    pub fn synthetic_by_mint(&self, mint: &Pubkey) -> Option<&Synthetic> {
        self.synthetics.iter().find(|s| s.asset_address == *mint)
    }

    pub fn collateral_by_mint(&self, mint: &Pubkey) -> Option<&Collateral> {
        self.collaterals
            .iter()
            .find(|c| c.collateral_address == *mint)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollateralEntry {
    pub amount: u64,
    pub collateral_address: Pubkey,
    /// Index into `AssetsList::collaterals`.
    pub index: u8,
}

/// A staking position (debt shares backed by deposited collaterals).
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeAccount {
    pub owner: Pubkey,
    pub version: u8,
    pub debt_shares: u64,
    /// Slot after which the account may be liquidated; [`DEADLINE_UNSET`] until flagged.
    pub liquidation_deadline: u64,
    pub bump: u8,
    pub collaterals: SmallVec<[CollateralEntry; 4]>,
}

impl ExchangeAccount {
    pub fn deadline_is_set(&self) -> bool {
        self.liquidation_deadline != DEADLINE_UNSET
    }
}

/// A collateralized-debt pool with its own rate and liquidation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Vault {
    pub halted: bool,
    pub synthetic: Pubkey,
    pub collateral: Pubkey,
    pub collateral_price_feed: Pubkey,
    pub oracle_type: u8,
    pub open_fee: ScaledDecimal,
    /// Annual debt interest rate.
    pub debt_interest_rate: ScaledDecimal,
    pub collateral_ratio: ScaledDecimal,
    pub liquidation_threshold: ScaledDecimal,
    /// Fraction of the debt repaid per liquidation call.
    pub liquidation_ratio: ScaledDecimal,
    pub liquidation_penalty_liquidator: ScaledDecimal,
    pub liquidation_penalty_exchange: ScaledDecimal,
    pub accumulated_interest: ScaledDecimal,
    /// Compound interest index, starts at 1.0.
    pub accumulated_interest_rate: ScaledDecimal,
    pub collateral_reserve: Pubkey,
    pub liquidation_fund: Pubkey,
    pub mint_amount: ScaledDecimal,
    pub collateral_amount: ScaledDecimal,
    pub max_borrow: ScaledDecimal,
    /// Unix seconds of the last whole adjustment period.
    pub last_update: i64,
    pub vault_type: u8,
    pub bump: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VaultEntry {
    pub owner: Pubkey,
    pub vault: Pubkey,
    /// Vault interest index at the time `synthetic_amount` was last rebased.
    pub last_accumulated_interest_rate: ScaledDecimal,
    pub synthetic_amount: ScaledDecimal,
    pub collateral_amount: ScaledDecimal,
    pub bump: u8,
}
