//! Liquidator chain interaction layer.
//!
//! This crate provides:
//! - Ledger reads and account subscriptions over Solana RPC / pubsub
//! - Anchor encoding of the exchange program's instructions
//! - Transaction signing and sending
//! - Wallet loading from the environment

mod client;
mod instructions;
mod rpc;
mod signer;

pub use client::{decode_transaction, plan_instructions, SynthetifyClient};
pub use instructions::InstructionContext;
pub use rpc::{commitment, RpcLedger};
pub use signer::{keypair_from_csv, load_keypair};
