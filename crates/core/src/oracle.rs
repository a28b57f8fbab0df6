//! Pyth price account decoding.
//!
//! Reads the aggregate price straight out of a v2 price account and converts
//! it into an exact [`ScaledDecimal`]. No floating point is involved.

use solana_sdk::pubkey::Pubkey;

use crate::decimal::{ten_to, ScaledDecimal};
use crate::error::{DecodeError, LiquidatorError};

pub const PYTH_MAGIC: u32 = 0xa1b2_c3d4;
const PRICE_ACCOUNT_MIN_LEN: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceStatus {
    Unknown,
    Trading,
    Halted,
    Auction,
    Ignored,
}

impl From<u32> for PriceStatus {
    fn from(value: u32) -> Self {
        match value {
            1 => PriceStatus::Trading,
            2 => PriceStatus::Halted,
            3 => PriceStatus::Auction,
            4 => PriceStatus::Ignored,
            _ => PriceStatus::Unknown,
        }
    }
}

/// Aggregate price of a Pyth feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PythPrice {
    pub price: i64,
    pub confidence: u64,
    pub exponent: i32,
    pub status: PriceStatus,
    pub publish_slot: u64,
}

fn read<const N: usize>(data: &[u8], at: usize) -> Result<[u8; N], DecodeError> {
    data.get(at..at + N)
        .and_then(|s| s.try_into().ok())
        .ok_or(DecodeError::PriceTooShort(data.len()))
}

pub fn parse_price_account(data: &[u8]) -> Result<PythPrice, DecodeError> {
    if data.len() < PRICE_ACCOUNT_MIN_LEN {
        return Err(DecodeError::PriceTooShort(data.len()));
    }
    let magic = u32::from_le_bytes(read(data, 0)?);
    if magic != PYTH_MAGIC {
        return Err(DecodeError::PriceMagic(magic));
    }
    Ok(PythPrice {
        exponent: i32::from_le_bytes(read(data, 20)?),
        price: i64::from_le_bytes(read(data, 208)?),
        confidence: u64::from_le_bytes(read(data, 216)?),
        status: PriceStatus::from(u32::from_le_bytes(read(data, 224)?)),
        publish_slot: u64::from_le_bytes(read(data, 232)?),
    })
}

impl PythPrice {
    /// The price at `scale` decimals, or `None` unless the feed is trading.
    pub fn to_scaled(&self, scale: u8) -> Option<ScaledDecimal> {
        if self.status != PriceStatus::Trading || self.price <= 0 {
            return None;
        }
        let shift = scale as i32 + self.exponent;
        let raw = num_bigint::BigInt::from(self.price);
        let magnitude = if shift >= 0 {
            raw * ten_to(u8::try_from(shift).ok()?)
        } else {
            raw / ten_to(u8::try_from(-shift).ok()?)
        };
        Some(ScaledDecimal::new(magnitude, scale))
    }
}

/// Decode `feed`'s account data into a price at `scale` decimals.
pub fn price_from_feed(feed: &Pubkey, data: &[u8], scale: u8) -> Result<ScaledDecimal, LiquidatorError> {
    let parsed = parse_price_account(data)?;
    parsed
        .to_scaled(scale)
        .ok_or(LiquidatorError::StalePrice(*feed))
}

/// Price account bytes for tests.
#[cfg(test)]
pub(crate) fn encode_price_account(price: i64, exponent: i32, status: u32) -> Vec<u8> {
    let mut data = vec![0u8; PRICE_ACCOUNT_MIN_LEN];
    data[0..4].copy_from_slice(&PYTH_MAGIC.to_le_bytes());
    data[20..24].copy_from_slice(&exponent.to_le_bytes());
    data[208..216].copy_from_slice(&price.to_le_bytes());
    data[216..224].copy_from_slice(&1_000u64.to_le_bytes());
    data[224..228].copy_from_slice(&status.to_le_bytes());
    data[232..240].copy_from_slice(&42u64.to_le_bytes());
    data
}
