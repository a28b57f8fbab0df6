//! Exchange program instructions.
//!
//! Anchor instruction data is the 8-byte sighash `sha256("global:<name>")`
//! followed by little-endian arguments. Account metas follow the program's
//! account structs in declaration order.

use liquidator_core::{anchor_discriminator, PlannedInstruction, ProtocolAddresses};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

/// Everything instruction encoding needs besides the planned instruction.
#[derive(Debug, Clone, Copy)]
pub struct InstructionContext {
    pub addresses: ProtocolAddresses,
    pub wallet: Pubkey,
    /// xUSD mint (settlement synthetic).
    pub usd_token: Pubkey,
    pub assets_list: Pubkey,
}

fn sighash(name: &str) -> Vec<u8> {
    anchor_discriminator("global", name).to_vec()
}

fn with_args(name: &str, args: &[&[u8]]) -> Vec<u8> {
    let mut data = sighash(name);
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

pub fn set_assets_prices(program: &Pubkey, assets_list: Pubkey, feeds: &[Pubkey]) -> Instruction {
    let mut accounts = vec![AccountMeta::new(assets_list, false)];
    accounts.extend(feeds.iter().map(|feed| AccountMeta::new_readonly(*feed, false)));
    Instruction {
        program_id: *program,
        accounts,
        data: sighash("set_assets_prices"),
    }
}

pub fn check_account_collateralization(ctx: &InstructionContext, exchange_account: Pubkey) -> Instruction {
    Instruction {
        program_id: ctx.addresses.program,
        accounts: vec![
            AccountMeta::new(ctx.addresses.state, false),
            AccountMeta::new(exchange_account, false),
            AccountMeta::new_readonly(ctx.assets_list, false),
        ],
        data: sighash("check_account_collateralization"),
    }
}

/// Unlimited approval of `source` to the exchange authority.
pub fn approve_unlimited(ctx: &InstructionContext, source: Pubkey) -> anyhow::Result<Instruction> {
    Ok(spl_token::instruction::approve(
        &spl_token::id(),
        &source,
        &ctx.addresses.exchange_authority,
        &ctx.wallet,
        &[],
        u64::MAX,
    )?)
}

/// Encode a planned instruction into program instructions.
pub fn encode(ctx: &InstructionContext, planned: &PlannedInstruction) -> anyhow::Result<Instruction> {
    let program = ctx.addresses.program;
    let ix = match planned {
        PlannedInstruction::UpdatePrices { assets_list, feeds } => {
            set_assets_prices(&program, *assets_list, feeds)
        }
        PlannedInstruction::ApproveUnlimited { source } => approve_unlimited(ctx, *source)?,
        PlannedInstruction::Swap {
            amount,
            token_in,
            token_for,
            user_token_account_in,
            user_token_account_for,
        } => Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::new(ctx.addresses.state, false),
                AccountMeta::new_readonly(ctx.addresses.exchange_authority, false),
                AccountMeta::new(ctx.assets_list, false),
                AccountMeta::new_readonly(spl_token::id(), false),
                AccountMeta::new(*token_in, false),
                AccountMeta::new(*token_for, false),
                AccountMeta::new(*user_token_account_in, false),
                AccountMeta::new(*user_token_account_for, false),
                AccountMeta::new(ctx.addresses.exchange_account(&ctx.wallet), false),
                AccountMeta::new_readonly(ctx.wallet, true),
            ],
            data: with_args("swap", &[&amount.to_le_bytes()[..]]),
        },
        PlannedInstruction::Liquidate {
            exchange_account,
            amount,
            liquidator_usd_account,
            liquidator_collateral_account,
            liquidation_fund,
            reserve_account,
        } => Instruction {
            program_id: program,
            accounts: vec![
                AccountMeta::new(ctx.addresses.state, false),
                AccountMeta::new_readonly(ctx.addresses.exchange_authority, false),
                AccountMeta::new(ctx.assets_list, false),
                AccountMeta::new_readonly(spl_token::id(), false),
                AccountMeta::new(ctx.usd_token, false),
                AccountMeta::new(*liquidator_usd_account, false),
                AccountMeta::new(*liquidator_collateral_account, false),
                AccountMeta::new(*exchange_account, false),
                AccountMeta::new_readonly(ctx.wallet, true),
                AccountMeta::new(*liquidation_fund, false),
                AccountMeta::new(*reserve_account, false),
            ],
            data: with_args("liquidate", &[&amount.raw().to_le_bytes()[..]]),
        },
        PlannedInstruction::LiquidateVault {
            amount,
            owner,
            synthetic,
            collateral,
            collateral_reserve,
            liquidation_fund,
            collateral_price_feed,
            vault_type,
            liquidator_synthetic_account,
            liquidator_collateral_account,
        } => {
            let vault = ctx.addresses.vault(synthetic, collateral, *vault_type);
            Instruction {
                program_id: program,
                accounts: vec![
                    AccountMeta::new_readonly(ctx.addresses.state, false),
                    AccountMeta::new(ctx.addresses.vault_entry(owner, &vault), false),
                    AccountMeta::new(vault, false),
                    AccountMeta::new(*synthetic, false),
                    AccountMeta::new_readonly(*collateral, false),
                    AccountMeta::new(ctx.assets_list, false),
                    AccountMeta::new_readonly(*collateral_price_feed, false),
                    AccountMeta::new(*collateral_reserve, false),
                    AccountMeta::new(*liquidator_synthetic_account, false),
                    AccountMeta::new(*liquidator_collateral_account, false),
                    AccountMeta::new(*liquidation_fund, false),
                    AccountMeta::new_readonly(*owner, false),
                    AccountMeta::new_readonly(ctx.wallet, true),
                    AccountMeta::new_readonly(spl_token::id(), false),
                    AccountMeta::new_readonly(ctx.addresses.exchange_authority, false),
                ],
                data: with_args("liquidate_vault", &[&amount.raw().to_le_bytes()[..], &[*vault_type][..]]),
            }
        }
    };
    Ok(ix)
}
