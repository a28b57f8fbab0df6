//! Exact scaled-integer decimal arithmetic.
//!
//! A [`ScaledDecimal`] is `magnitude / 10^scale` with an arbitrary precision
//! magnitude. Every financial quantity the liquidator computes (debt,
//! collateral, prices, interest indexes) flows through this type so results
//! match the on-chain program to the last unit.
//!
//! Rounding rules:
//! - `add`/`sub` need equal scales and are exact.
//! - `mul`/`div` keep the scale of the left operand and round toward
//!   negative infinity.
//! - `mul_up`/`div_up` round toward positive infinity and are used where the
//!   protocol must never be under-credited.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::MathError;

/// `10^exp` as a big integer.
pub fn ten_to(exp: u8) -> BigInt {
    num_traits::pow(BigInt::from(10u8), exp as usize)
}

/// Fixed-point decimal value with an explicit scale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScaledDecimal {
    magnitude: BigInt,
    scale: u8,
}

impl ScaledDecimal {
    pub fn new(magnitude: impl Into<BigInt>, scale: u8) -> Self {
        Self {
            magnitude: magnitude.into(),
            scale,
        }
    }

    pub fn from_u64(raw: u64, scale: u8) -> Self {
        Self::new(raw, scale)
    }

    pub fn zero(scale: u8) -> Self {
        Self::new(BigInt::zero(), scale)
    }

    /// `1.0` at the given scale.
    pub fn one(scale: u8) -> Self {
        Self::new(ten_to(scale), scale)
    }

    #[inline]
    pub fn magnitude(&self) -> &BigInt {
        &self.magnitude
    }

    #[inline]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    pub fn is_zero(&self) -> bool {
        self.magnitude.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.magnitude.is_positive()
    }

    /// Raw magnitude as an on-chain `u64` amount.
    pub fn to_u64(&self) -> Result<u64, MathError> {
        self.magnitude.to_u64().ok_or(MathError::Overflow("u64"))
    }

    /// Raw magnitude as an on-chain `u128` decimal value.
    pub fn to_u128(&self) -> Result<u128, MathError> {
        self.magnitude.to_u128().ok_or(MathError::Overflow("u128"))
    }

    fn ensure_same_scale(&self, other: &Self) -> Result<(), MathError> {
        if self.scale != other.scale {
            return Err(MathError::ScaleMismatch {
                left: self.scale,
                right: other.scale,
            });
        }
        Ok(())
    }

    pub fn try_add(&self, other: &Self) -> Result<Self, MathError> {
        self.ensure_same_scale(other)?;
        Ok(Self::new(&self.magnitude + &other.magnitude, self.scale))
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self, MathError> {
        self.ensure_same_scale(other)?;
        Ok(Self::new(&self.magnitude - &other.magnitude, self.scale))
    }

    /// `floor(self * other)` at `self.scale`.
    pub fn mul(&self, other: &Self) -> Self {
        let product = &self.magnitude * &other.magnitude;
        Self::new(product.div_floor(&ten_to(other.scale)), self.scale)
    }

    /// `ceil(self * other)` at `self.scale`.
    pub fn mul_up(&self, other: &Self) -> Self {
        let denominator = ten_to(other.scale);
        let product = &self.magnitude * &other.magnitude + (&denominator - BigInt::one());
        Self::new(product.div_floor(&denominator), self.scale)
    }

    /// `floor(self / other)` at `self.scale`.
    pub fn div(&self, other: &Self) -> Result<Self, MathError> {
        if other.magnitude.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let numerator = &self.magnitude * ten_to(other.scale);
        Ok(Self::new(numerator.div_floor(&other.magnitude), self.scale))
    }

    /// `ceil(self / other)` at `self.scale`.
    pub fn div_up(&self, other: &Self) -> Result<Self, MathError> {
        if other.magnitude.is_zero() {
            return Err(MathError::DivisionByZero);
        }
        let numerator = &self.magnitude * ten_to(other.scale);
        Ok(Self::new(numerator.div_ceil(&other.magnitude), self.scale))
    }

    /// Square-and-multiply exponentiation, each step rounded like [`Self::mul`].
    pub fn pow(&self, exponent: u64) -> Self {
        let mut result = Self::one(self.scale);
        let mut base = self.clone();
        let mut remaining = exponent;

        while remaining > 0 {
            if remaining % 2 == 1 {
                result = result.mul(&base);
            }
            remaining /= 2;
            base = base.mul(&base);
        }
        result
    }

    /// `floor(self * numerator / denominator)`, used for percentage buffers.
    pub fn mul_ratio(&self, numerator: u64, denominator: u64) -> Result<Self, MathError> {
        if denominator == 0 {
            return Err(MathError::DivisionByZero);
        }
        let scaled = &self.magnitude * BigInt::from(numerator);
        Ok(Self::new(
            scaled.div_floor(&BigInt::from(denominator)),
            self.scale,
        ))
    }

    /// Change the scale, flooring when digits are dropped.
    pub fn rescale(&self, scale: u8) -> Self {
        match scale.cmp(&self.scale) {
            Ordering::Equal => self.clone(),
            Ordering::Greater => Self::new(&self.magnitude * ten_to(scale - self.scale), scale),
            Ordering::Less => Self::new(
                self.magnitude.div_floor(&ten_to(self.scale - scale)),
                scale,
            ),
        }
    }

    /// Ordering between two values of the same scale.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, MathError> {
        self.ensure_same_scale(other)?;
        Ok(self.magnitude.cmp(&other.magnitude))
    }
}

impl PartialOrd for ScaledDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl fmt::Display for ScaledDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.magnitude.sign() == Sign::Minus {
            "-"
        } else {
            ""
        };
        let digits = self.magnitude.abs().to_string();
        let scale = self.scale as usize;
        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (integer, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{integer}.{fraction}")
    }
}

impl FromStr for ScaledDecimal {
    type Err = MathError;

    /// Parses `[-]digits[.digits]`; the scale is the number of fraction digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MathError::InvalidFormat(s.to_string());
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (integer, fraction) = match body.split_once('.') {
            Some((integer, fraction)) if !fraction.is_empty() => (integer, fraction),
            Some(_) => return Err(invalid()),
            None => (body, ""),
        };
        if integer.is_empty()
            || !integer.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let scale = u8::try_from(fraction.len()).map_err(|_| invalid())?;
        let mut magnitude: BigInt = format!("{integer}{fraction}")
            .parse()
            .map_err(|_| invalid())?;
        if negative {
            magnitude = -magnitude;
        }
        Ok(Self::new(magnitude, scale))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> ScaledDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_add_same_scale() {
        let a = ScaledDecimal::new(1337, 6);
        let b = ScaledDecimal::new(555, 6);
        let sum = a.try_add(&b).unwrap();
        assert_eq!(sum, ScaledDecimal::new(1892, 6));
        assert_eq!(sum, b.try_add(&a).unwrap());
        assert_eq!(sum.scale(), 6);
    }

    #[test]
    fn test_add_scale_mismatch() {
        let a = ScaledDecimal::new(1, 6);
        let b = ScaledDecimal::new(1, 8);
        assert_eq!(
            a.try_add(&b),
            Err(MathError::ScaleMismatch { left: 6, right: 8 })
        );
        assert!(a.try_sub(&b).is_err());
        assert!(a.partial_cmp(&b).is_none());
    }

    #[test]
    fn test_sub_goes_negative() {
        let diff = d("1.50").try_sub(&d("2.25")).unwrap();
        assert_eq!(diff.to_string(), "-0.75");
    }

    #[test]
    fn test_mul_keeps_left_scale() {
        // 1.234 * 0.04321 = 0.05332114 -> 0.053
        let product = ScaledDecimal::new(1234, 3).mul(&ScaledDecimal::new(4321, 5));
        assert_eq!(product, ScaledDecimal::new(53, 3));
    }

    #[test]
    fn test_mul_up_rounds_against_caller() {
        let a = ScaledDecimal::new(1234, 3);
        let b = ScaledDecimal::new(4321, 5);
        assert_eq!(a.mul_up(&b), ScaledDecimal::new(54, 3));

        // exact products are not bumped
        let exact = d("2.000").mul_up(&d("1.5"));
        assert_eq!(exact, d("3.000"));
    }

    #[test]
    fn test_mul_floors_negative() {
        // -0.5 * 0.3 = -0.15 -> -0.2 at scale 1
        assert_eq!(d("-0.5").mul(&d("0.3")), d("-0.2"));
    }

    #[test]
    fn test_div() {
        let q = d("10.000").div(&d("3.0")).unwrap();
        assert_eq!(q, d("3.333"));
        let q_up = d("10.000").div_up(&d("3.0")).unwrap();
        assert_eq!(q_up, d("3.334"));
        assert_eq!(d("1.0").div(&d("0.00")), Err(MathError::DivisionByZero));
    }

    #[test]
    fn test_pow() {
        let two = ScaledDecimal::new(200_000_000u64, 8);
        assert_eq!(two.pow(17), ScaledDecimal::new(13_107_200_000_000u64, 8));
        assert_eq!(two.pow(17).to_string(), "131072.00000000");
        assert_eq!(two.pow(0), ScaledDecimal::one(8));
    }

    #[test]
    fn test_pow_splits_exponent() {
        let base = d("1.50000000");
        for (m, n) in [(0, 5), (3, 5), (1, 7), (4, 4)] {
            assert_eq!(base.pow(m + n), base.pow(m).mul(&base.pow(n)), "m={m} n={n}");
        }
    }

    #[test]
    fn test_display_padding() {
        assert_eq!(ScaledDecimal::new(5, 4).to_string(), "0.0005");
        assert_eq!(ScaledDecimal::new(123456, 2).to_string(), "1234.56");
        assert_eq!(ScaledDecimal::new(42, 0).to_string(), "42");
        assert_eq!(ScaledDecimal::zero(3).to_string(), "0.000");
    }

    #[test]
    fn test_parse_display_roundtrip() {
        for (m, s) in [(0i64, 0u8), (7, 0), (5, 4), (-5, 4), (1_000_000_007, 9), (-123456, 2)] {
            let x = ScaledDecimal::new(m, s);
            assert_eq!(x.to_string().parse::<ScaledDecimal>().unwrap(), x);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for s in ["", ".", "1.", ".5", "1.2.3", "abc", "--1", "1e5"] {
            assert!(s.parse::<ScaledDecimal>().is_err(), "{s}");
        }
    }

    #[test]
    fn test_rescale_and_ratio() {
        assert_eq!(d("1.999").rescale(1), d("1.9"));
        assert_eq!(d("1.9").rescale(3), d("1.900"));
        assert_eq!(d("1.000").mul_ratio(102, 100).unwrap(), d("1.020"));
        assert!(d("1.0").mul_ratio(1, 0).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(ScaledDecimal::from_u64(u64::MAX, 6).to_u64().unwrap(), u64::MAX);
        assert!(d("-1").to_u64().is_err());
        let big = ScaledDecimal::new(BigInt::from(u64::MAX) * 2u32, 0);
        assert!(big.to_u64().is_err());
        assert!(big.to_u128().is_ok());
    }
}
