//! Configuration for the liquidator.
//!
//! - Runtime configuration (profiles, scan timing, sizing margins)
//! - Network configuration (RPC endpoints, program id, derived PDAs)

mod bot;
mod network;

pub use bot::{
    BotConfig, InterestConfig, LiquidationConfig, ScannerConfig, SellerConfig,
};
pub use network::{NetworkConfig, ProtocolAddresses, EXCHANGE_AUTHORITY_SEED, STATE_SEED};
