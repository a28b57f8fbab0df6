//! Liquidation transactions as plain data.
//!
//! The scheduler decides *what* to send; the chain adapter turns a
//! [`TransactionPlan`] into program instructions, signs and submits it.

use smallvec::SmallVec;
use solana_sdk::pubkey::Pubkey;

use crate::sizing::{RepayAmount, VaultSizing};
use crate::state::{AssetsList, Collateral, Vault};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedInstruction {
    /// Refresh oracle prices in the assets list from `feeds`.
    UpdatePrices { assets_list: Pubkey, feeds: Vec<Pubkey> },
    /// Unlimited token approval of `source` to the exchange authority.
    ApproveUnlimited { source: Pubkey },
    /// Exchange swap between two synthetics.
    Swap {
        amount: u64,
        token_in: Pubkey,
        token_for: Pubkey,
        user_token_account_in: Pubkey,
        user_token_account_for: Pubkey,
    },
    /// Repay part of a staking account's debt for its collateral.
    Liquidate {
        exchange_account: Pubkey,
        amount: RepayAmount,
        liquidator_usd_account: Pubkey,
        liquidator_collateral_account: Pubkey,
        liquidation_fund: Pubkey,
        reserve_account: Pubkey,
    },
    /// Repay part of a vault entry's debt for its collateral.
    LiquidateVault {
        amount: RepayAmount,
        owner: Pubkey,
        synthetic: Pubkey,
        collateral: Pubkey,
        collateral_reserve: Pubkey,
        liquidation_fund: Pubkey,
        collateral_price_feed: Pubkey,
        vault_type: u8,
        liquidator_synthetic_account: Pubkey,
        liquidator_collateral_account: Pubkey,
    },
}

/// Ordered instructions sent as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPlan {
    pub instructions: SmallVec<[PlannedInstruction; 4]>,
}

impl TransactionPlan {
    /// A plan starting with the price refresh every batch needs.
    pub fn with_price_update(assets_list: Pubkey, list: &AssetsList) -> Self {
        let mut plan = Self::default();
        plan.push(update_prices(assets_list, list));
        plan
    }

    pub fn push(&mut self, instruction: PlannedInstruction) -> &mut Self {
        self.instructions.push(instruction);
        self
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Price refresh over every asset that has a feed.
pub fn update_prices(assets_list: Pubkey, list: &AssetsList) -> PlannedInstruction {
    let feeds = list
        .assets
        .iter()
        .map(|asset| asset.feed_address)
        .filter(|feed| *feed != Pubkey::default())
        .collect();
    PlannedInstruction::UpdatePrices { assets_list, feeds }
}

/// Liquidator token accounts used by one liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidatorAccounts {
    pub xusd: Pubkey,
    pub synthetic: Pubkey,
    pub collateral: Pubkey,
}

pub fn staking_liquidation_plan(
    assets_list: Pubkey,
    list: &AssetsList,
    exchange_account: Pubkey,
    collateral: &Collateral,
    amount: RepayAmount,
    xusd_account: Pubkey,
    collateral_account: Pubkey,
) -> TransactionPlan {
    let mut plan = TransactionPlan::with_price_update(assets_list, list);
    plan.push(PlannedInstruction::Liquidate {
        exchange_account,
        amount,
        liquidator_usd_account: xusd_account,
        liquidator_collateral_account: collateral_account,
        liquidation_fund: collateral.liquidation_fund,
        reserve_account: collateral.reserve_address,
    });
    plan
}

pub fn vault_liquidation_plan(
    assets_list: Pubkey,
    list: &AssetsList,
    vault: &Vault,
    owner: Pubkey,
    xusd_mint: Pubkey,
    sizing: &VaultSizing,
    accounts: LiquidatorAccounts,
) -> TransactionPlan {
    let mut plan = TransactionPlan::with_price_update(assets_list, list);
    if let Some(swap_in) = sizing.swap_in {
        plan.push(PlannedInstruction::ApproveUnlimited {
            source: accounts.xusd,
        })
        .push(PlannedInstruction::Swap {
            amount: swap_in,
            token_in: xusd_mint,
            token_for: vault.synthetic,
            user_token_account_in: accounts.xusd,
            user_token_account_for: accounts.synthetic,
        });
    }
    plan.push(PlannedInstruction::ApproveUnlimited {
        source: accounts.synthetic,
    })
    .push(PlannedInstruction::LiquidateVault {
        amount: sizing.repay,
        owner,
        synthetic: vault.synthetic,
        collateral: vault.collateral,
        collateral_reserve: vault.collateral_reserve,
        liquidation_fund: vault.liquidation_fund,
        collateral_price_feed: vault.collateral_price_feed,
        vault_type: vault.vault_type,
        liquidator_synthetic_account: accounts.synthetic,
        liquidator_collateral_account: accounts.collateral,
    });
    plan
}
