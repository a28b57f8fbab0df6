//! Signing client for the exchange program.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dashmap::DashMap;
use liquidator_core::{ExchangeClient, TransactionPlan};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use spl_associated_token_account::get_associated_token_address;
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use tracing::{debug, info, instrument};

use crate::instructions::{self, InstructionContext};

/// [`ExchangeClient`] that signs with the liquidator wallet and sends through
/// an RPC node, waiting for confirmation.
pub struct SynthetifyClient {
    rpc: Arc<RpcClient>,
    payer: Arc<Keypair>,
    commitment: CommitmentConfig,
    ix_ctx: InstructionContext,
    /// mint -> associated token account known to exist
    token_accounts: DashMap<Pubkey, Pubkey>,
}

impl SynthetifyClient {
    pub fn new(
        rpc: Arc<RpcClient>,
        payer: Arc<Keypair>,
        commitment: CommitmentConfig,
        ix_ctx: InstructionContext,
    ) -> Self {
        Self {
            rpc,
            payer,
            commitment,
            ix_ctx,
            token_accounts: DashMap::new(),
        }
    }

    async fn send(&self, instructions: &[Instruction]) -> Result<Signature> {
        let started = Instant::now();
        let blockhash = self.rpc.get_latest_blockhash().await.context("getLatestBlockhash")?;
        let tx = Transaction::new_signed_with_payer(
            instructions,
            Some(&self.payer.pubkey()),
            &[self.payer.as_ref()],
            blockhash,
        );
        let signature = self
            .rpc
            .send_and_confirm_transaction(&tx)
            .await
            .context("sending transaction")?;
        debug!(
            %signature,
            instructions = instructions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Transaction confirmed"
        );
        Ok(signature)
    }
}

/// Encode every planned instruction in order.
pub fn plan_instructions(ctx: &InstructionContext, plan: &TransactionPlan) -> Result<Vec<Instruction>> {
    plan.instructions
        .iter()
        .map(|planned| instructions::encode(ctx, planned))
        .collect()
}

/// Decode a base64, bincode-serialized versioned transaction.
pub fn decode_transaction(encoded: &str) -> Result<VersionedTransaction> {
    let bytes = STANDARD.decode(encoded).context("invalid base64 transaction")?;
    bincode::deserialize(&bytes).context("invalid transaction encoding")
}

#[async_trait]
impl ExchangeClient for SynthetifyClient {
    fn wallet(&self) -> Pubkey {
        self.payer.pubkey()
    }

    async fn token_account(&self, mint: &Pubkey) -> Result<Pubkey> {
        if let Some(account) = self.token_accounts.get(mint) {
            return Ok(*account);
        }
        let wallet = self.payer.pubkey();
        let account = get_associated_token_address(&wallet, mint);
        let existing = self
            .rpc
            .get_account_with_commitment(&account, self.commitment)
            .await?
            .value;
        if existing.is_none() {
            let ix = create_associated_token_account_idempotent(&wallet, &wallet, mint, &spl_token::id());
            let signature = self.send(&[ix]).await?;
            info!(%mint, %account, %signature, "Created token account");
        }
        self.token_accounts.insert(*mint, account);
        Ok(account)
    }

    #[instrument(skip(self))]
    async fn check_account(&self, exchange_account: &Pubkey) -> Result<Signature> {
        let ix = instructions::check_account_collateralization(&self.ix_ctx, *exchange_account);
        self.send(&[ix]).await
    }

    async fn execute(&self, plan: &TransactionPlan) -> Result<Signature> {
        let ixs = plan_instructions(&self.ix_ctx, plan)?;
        self.send(&ixs).await
    }

    async fn submit_serialized(&self, transaction: &str) -> Result<Signature> {
        let unsigned = decode_transaction(transaction)?;
        let signed = VersionedTransaction::try_new(unsigned.message, &[self.payer.as_ref()])
            .context("signing aggregator transaction")?;
        Ok(self.rpc.send_and_confirm_transaction(&signed).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidator_core::{PlannedInstruction, ProtocolAddresses, RepayAmount};
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{v0, VersionedMessage};

    fn ctx() -> InstructionContext {
        InstructionContext {
            addresses: ProtocolAddresses::derive(Pubkey::new_unique()),
            wallet: Pubkey::new_unique(),
            usd_token: Pubkey::new_unique(),
            assets_list: Pubkey::new_unique(),
        }
    }

    #[test]
    fn test_plan_instructions_keep_order() {
        let ctx = ctx();
        let mut plan = TransactionPlan::default();
        plan.push(PlannedInstruction::UpdatePrices {
            assets_list: ctx.assets_list,
            feeds: vec![Pubkey::new_unique()],
        })
        .push(PlannedInstruction::ApproveUnlimited {
            source: Pubkey::new_unique(),
        })
        .push(PlannedInstruction::Swap {
            amount: 10,
            token_in: ctx.usd_token,
            token_for: Pubkey::new_unique(),
            user_token_account_in: Pubkey::new_unique(),
            user_token_account_for: Pubkey::new_unique(),
        })
        .push(PlannedInstruction::Liquidate {
            exchange_account: Pubkey::new_unique(),
            amount: RepayAmount::Exact(5),
            liquidator_usd_account: Pubkey::new_unique(),
            liquidator_collateral_account: Pubkey::new_unique(),
            liquidation_fund: Pubkey::new_unique(),
            reserve_account: Pubkey::new_unique(),
        });

        let ixs = plan_instructions(&ctx, &plan).unwrap();
        let programs: Vec<Pubkey> = ixs.iter().map(|ix| ix.program_id).collect();
        assert_eq!(
            programs,
            vec![
                ctx.addresses.program,
                spl_token::id(),
                ctx.addresses.program,
                ctx.addresses.program
            ]
        );
    }

    #[test]
    fn test_decode_transaction() {
        let payer = Keypair::new();
        let message = v0::Message::try_compile(&payer.pubkey(), &[], &[], Hash::default()).unwrap();
        let tx = VersionedTransaction::try_new(VersionedMessage::V0(message), &[&payer]).unwrap();
        let encoded = STANDARD.encode(bincode::serialize(&tx).unwrap());

        let decoded = decode_transaction(&encoded).unwrap();
        assert_eq!(decoded.message.static_account_keys()[0], payer.pubkey());
        assert!(decode_transaction("not base64!").is_err());
    }
}
