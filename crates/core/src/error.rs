//! Error taxonomy for the liquidator.
//!
//! Failures split into two groups. Candidate-local errors abort work on one
//! position and the scan moves on. Fatal errors stop the scan (or the whole
//! process) because continuing would hide real risk.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::codec::Schema;

/// Errors raised by [`crate::ScaledDecimal`] arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("scale mismatch: {left} != {right}")]
    ScaleMismatch { left: u8, right: u8 },
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid decimal literal: {0:?}")]
    InvalidFormat(String),
    #[error("value does not fit into {0}")]
    Overflow(&'static str),
}

/// Errors raised while decoding a raw account blob.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("{schema:?}: account data too short ({actual} < {expected} bytes)")]
    TooShort {
        schema: Schema,
        expected: usize,
        actual: usize,
    },
    #[error("{schema:?}: discriminator mismatch")]
    Discriminator { schema: Schema },
    #[error("price account: bad magic {0:#x}")]
    PriceMagic(u32),
    #[error("price account too short ({0} bytes)")]
    PriceTooShort(usize),
}

/// Top-level error for scanning and liquidation.
#[derive(Debug, Error)]
pub enum LiquidatorError {
    #[error(transparent)]
    Math(#[from] MathError),
    #[error("account {0} not found")]
    AccountNotFound(Pubkey),
    #[error("no usable price for {0}")]
    StalePrice(Pubkey),
    #[error("assets list has no entry at index {0}")]
    MissingAsset(u8),
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u64, available: u64 },
    #[error("vault {vault} uses unsupported oracle type {oracle_type}")]
    UnsupportedOracleType { vault: Pubkey, oracle_type: u8 },
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl LiquidatorError {
    /// Errors that must stop the current scan instead of skipping a candidate.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LiquidatorError::UnsupportedOracleType { .. }
                | LiquidatorError::Decode(_)
                | LiquidatorError::Math(MathError::ScaleMismatch { .. })
        )
    }
}

pub type Result<T, E = LiquidatorError> = std::result::Result<T, E>;
