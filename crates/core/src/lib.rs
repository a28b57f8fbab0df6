//! Liquidator core logic.
//!
//! This crate provides everything the Synthetify liquidation bot decides
//! without touching the network:
//! - Fixed-point decimals and the exchange's debt/eligibility math
//! - Typed decoders for exchange program accounts and Pyth price feeds
//! - Lazy vault interest accrual
//! - Liquidation sizing against the liquidator's balances
//! - Transaction planning as plain data
//! - Live account mirrors and the risk-ordered liquidation scheduler
//! - Selling of leftover collateral into xUSD
//!
//! The ledger, the exchange program and the swap aggregator are reached
//! through the traits in [`ports`].

pub mod codec;
pub mod config;
pub mod decimal;
pub mod error;
pub mod interest;
pub mod math;
pub mod oracle;
pub mod plan;
pub mod ports;
pub mod prices;
pub mod report;
pub mod scheduler;
pub mod seller;
pub mod sizing;
pub mod state;
pub mod synchronizer;

#[cfg(test)]
pub(crate) mod fixtures;
#[cfg(test)]
pub(crate) mod testing;

pub use codec::{anchor_discriminator, ProgramAccount, Schema};
pub use config::{BotConfig, NetworkConfig, ProtocolAddresses};
pub use decimal::ScaledDecimal;
pub use error::{DecodeError, LiquidatorError, MathError};
pub use plan::{PlannedInstruction, TransactionPlan};
pub use ports::{ExchangeClient, Ledger, LiquidatorContext, SwapAggregator, SwapQuote, TokenHolding};
pub use prices::PriceBook;
pub use report::{collateralization_report, CollateralizationReport};
pub use scheduler::{PassSummary, Scheduler};
pub use seller::{SellSummary, TokenSeller};
pub use sizing::RepayAmount;
pub use synchronizer::Synchronizer;
