//! HTTP clients for external services.
//!
//! - Jupiter: swap routing used to sell leftover tokens into xUSD

mod jupiter;

pub use jupiter::{JupiterClient, QuoteResponse, SwapResponse};
