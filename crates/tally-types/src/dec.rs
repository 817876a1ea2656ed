//! Exact unbounded-precision decimal amounts.
//!
//! [`Dec`] wraps an arbitrary-precision rational so that reward indexes,
//! commission cuts and owed amounts never lose value to rounding. The only
//! place precision is dropped is [`Dec::floor_split`], which hands back the
//! truncated fraction so the caller can conserve it.
//!
//! ## String form
//!
//! Terminating values print as plain decimals (`"18.7"`, `"1.8"`, `"100"`);
//! everything else prints as an exact fraction (`"1/3"`). Both forms parse
//! back to the identical value, so the string form is used for persistence
//! and serde.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::TokenAmount;

/// Errors from decimal parsing and conversion.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecError {
    /// The literal is not a decimal, integer or fraction.
    #[error("invalid decimal literal: {0:?}")]
    Invalid(String),

    /// A fraction literal had a zero denominator.
    #[error("zero denominator")]
    ZeroDenominator,

    /// The value is negative or too large for a [`TokenAmount`].
    #[error("value {0} does not fit in a token amount")]
    OutOfRange(String),
}

/// An exact rational amount.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Dec(BigRational);

impl Dec {
    /// Zero.
    pub fn zero() -> Self {
        Self(BigRational::zero())
    }

    /// One.
    pub fn one() -> Self {
        Self(BigRational::one())
    }

    /// An integer value.
    pub fn from_integer(value: i128) -> Self {
        Self(BigRational::from_integer(BigInt::from(value)))
    }

    /// A whole token amount.
    pub fn from_tokens(amount: TokenAmount) -> Self {
        Self(BigRational::from_integer(BigInt::from(amount)))
    }

    /// `numer / denom`, or `None` when `denom` is zero.
    pub fn from_ratio(numer: i128, denom: i128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        Some(Self(BigRational::new(BigInt::from(numer), BigInt::from(denom))))
    }

    /// Borrow the underlying rational.
    pub fn as_ratio(&self) -> &BigRational {
        &self.0
    }

    /// Returns `true` for exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` for values strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    /// Returns `true` for values strictly above zero.
    pub fn is_positive(&self) -> bool {
        self.0.is_positive()
    }

    /// Returns `true` when the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.0.is_integer()
    }

    /// Returns `true` when `0 <= self <= 1`.
    pub fn is_unit_interval(&self) -> bool {
        !self.is_negative() && self.0 <= BigRational::one()
    }

    /// Exact division, `None` on a zero divisor.
    pub fn checked_div(&self, rhs: &Dec) -> Option<Dec> {
        if rhs.is_zero() {
            return None;
        }
        Some(Dec(&self.0 / &rhs.0))
    }

    /// Split a non-negative value into its payable integer part and the
    /// fractional remainder in `[0, 1)`.
    ///
    /// # Errors
    ///
    /// - [`DecError::OutOfRange`] if the value is negative or its integer part
    ///   exceeds [`TokenAmount::MAX`]
    pub fn floor_split(&self) -> Result<(TokenAmount, Dec), DecError> {
        if self.is_negative() {
            return Err(DecError::OutOfRange(self.to_string()));
        }
        let floor = self.0.floor();
        let whole = floor
            .to_integer()
            .to_u128()
            .ok_or_else(|| DecError::OutOfRange(self.to_string()))?;
        Ok((whole, Dec(&self.0 - &floor)))
    }
}

impl Default for Dec {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<TokenAmount> for Dec {
    fn from(amount: TokenAmount) -> Self {
        Self::from_tokens(amount)
    }
}

impl From<BigRational> for Dec {
    fn from(value: BigRational) -> Self {
        Self(value)
    }
}

/// Count how many times `divisor` divides `value`, dividing it out in place.
fn strip_factor(value: &mut BigInt, divisor: u32) -> usize {
    let divisor = BigInt::from(divisor);
    let mut count = 0;
    while !value.is_zero() && (&*value % &divisor).is_zero() {
        *value = &*value / &divisor;
        count += 1;
    }
    count
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ratio = &self.0;
        if ratio.is_integer() {
            return write!(f, "{}", ratio.numer());
        }

        let mut rest = ratio.denom().clone();
        let twos = strip_factor(&mut rest, 2);
        let fives = strip_factor(&mut rest, 5);
        if !rest.is_one() {
            return write!(f, "{}/{}", ratio.numer(), ratio.denom());
        }

        // Terminating decimal: scale to an integer and re-insert the point.
        let scale = twos.max(fives);
        let scaled = ratio.numer() * num_traits::pow(BigInt::from(10u32), scale) / ratio.denom();
        let sign = if scaled.sign() == Sign::Minus { "-" } else { "" };
        let digits = scaled.magnitude().to_string();
        let digits = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let (int_part, frac_part) = digits.split_at(digits.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({self})")
    }
}

fn parse_digits(digits: &str, literal: &str) -> Result<BigInt, DecError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecError::Invalid(literal.to_string()));
    }
    BigInt::from_str(digits).map_err(|_| DecError::Invalid(literal.to_string()))
}

impl FromStr for Dec {
    type Err = DecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let literal = s.trim();
        let (negative, body) = match literal.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, literal),
        };

        let magnitude = if let Some((numer, denom)) = body.split_once('/') {
            let numer = parse_digits(numer.trim(), literal)?;
            let denom = parse_digits(denom.trim(), literal)?;
            if denom.is_zero() {
                return Err(DecError::ZeroDenominator);
            }
            BigRational::new(numer, denom)
        } else if let Some((int_part, frac_part)) = body.split_once('.') {
            let int_value = parse_digits(int_part, literal)?;
            let frac_value = parse_digits(frac_part, literal)?;
            let denom = num_traits::pow(BigInt::from(10u32), frac_part.len());
            BigRational::new(int_value * &denom + frac_value, denom)
        } else {
            BigRational::from_integer(parse_digits(body, literal)?)
        };

        Ok(Dec(if negative { -magnitude } else { magnitude }))
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident) => {
        impl $trait<Dec> for Dec {
            type Output = Dec;
            fn $method(self, rhs: Dec) -> Dec {
                Dec(self.0.$method(rhs.0))
            }
        }

        impl<'a> $trait<&'a Dec> for Dec {
            type Output = Dec;
            fn $method(self, rhs: &'a Dec) -> Dec {
                Dec(self.0.$method(&rhs.0))
            }
        }

        impl<'a> $trait<Dec> for &'a Dec {
            type Output = Dec;
            fn $method(self, rhs: Dec) -> Dec {
                Dec((&self.0).$method(rhs.0))
            }
        }

        impl<'a, 'b> $trait<&'b Dec> for &'a Dec {
            type Output = Dec;
            fn $method(self, rhs: &'b Dec) -> Dec {
                Dec((&self.0).$method(&rhs.0))
            }
        }
    };
}

impl_binary_op!(Add, add);
impl_binary_op!(Sub, sub);
impl_binary_op!(Mul, mul);

impl AddAssign<&Dec> for Dec {
    fn add_assign(&mut self, rhs: &Dec) {
        self.0 += &rhs.0;
    }
}

impl AddAssign<Dec> for Dec {
    fn add_assign(&mut self, rhs: Dec) {
        self.0 += rhs.0;
    }
}

impl SubAssign<&Dec> for Dec {
    fn sub_assign(&mut self, rhs: &Dec) {
        self.0 -= &rhs.0;
    }
}

impl Neg for Dec {
    type Output = Dec;
    fn neg(self) -> Dec {
        Dec(-self.0)
    }
}

impl Sum for Dec {
    fn sum<I: Iterator<Item = Dec>>(iter: I) -> Dec {
        iter.fold(Dec::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Dec> for Dec {
    fn sum<I: Iterator<Item = &'a Dec>>(iter: I) -> Dec {
        iter.fold(Dec::zero(), |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().expect("valid literal")
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(dec("18.7"), Dec::from_ratio(187, 10).expect("ratio"));
        assert_eq!(dec("100"), Dec::from_integer(100));
        assert_eq!(dec("1/3"), Dec::from_ratio(1, 3).expect("ratio"));
        assert_eq!(dec("-0.25"), Dec::from_ratio(-1, 4).expect("ratio"));
        assert_eq!(dec(" 0.10 "), dec("0.1"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", ".", "1.", ".5", "abc", "1.2.3", "1/0", "--1", "+1", "1e5"] {
            assert!(bad.parse::<Dec>().is_err(), "{bad:?} should be rejected");
        }
        assert_eq!("1/0".parse::<Dec>(), Err(DecError::ZeroDenominator));
    }

    #[test]
    fn test_display_terminating() {
        assert_eq!(dec("18.7").to_string(), "18.7");
        assert_eq!(dec("1.8").to_string(), "1.8");
        assert_eq!(dec("0.0625").to_string(), "0.0625");
        assert_eq!(dec("-0.5").to_string(), "-0.5");
        assert_eq!(dec("42").to_string(), "42");
        assert_eq!(dec("90/50").to_string(), "1.8");
    }

    #[test]
    fn test_display_repeating_is_fraction() {
        assert_eq!(dec("1/3").to_string(), "1/3");
        assert_eq!(dec("-7/6").to_string(), "-7/6");
    }

    #[test]
    fn test_string_form_is_exact() {
        for literal in ["1/3", "0.0001", "123456789012345678901234567890.5", "-22/7", "0"] {
            let value = dec(literal);
            assert_eq!(dec(&value.to_string()), value);
        }
    }

    #[test]
    fn test_floor_split() {
        let (whole, rest) = dec("18.7").floor_split().expect("split");
        assert_eq!(whole, 18);
        assert_eq!(rest, dec("0.7"));

        let (whole, rest) = dec("18").floor_split().expect("split");
        assert_eq!(whole, 18);
        assert!(rest.is_zero());
    }

    #[test]
    fn test_floor_split_rejects_negative() {
        assert!(dec("-0.5").floor_split().is_err());
    }

    #[test]
    fn test_floor_split_overflow() {
        let huge = Dec::from_tokens(TokenAmount::MAX) + Dec::one();
        assert!(huge.floor_split().is_err());
    }

    #[test]
    fn test_checked_div() {
        assert_eq!(dec("90").checked_div(&dec("50")), Some(dec("1.8")));
        assert_eq!(dec("1").checked_div(&Dec::zero()), None);
    }

    #[test]
    fn test_unit_interval() {
        assert!(dec("0").is_unit_interval());
        assert!(dec("1").is_unit_interval());
        assert!(dec("0.1").is_unit_interval());
        assert!(!dec("1.01").is_unit_interval());
        assert!(!dec("-0.01").is_unit_interval());
    }

    #[test]
    fn test_serde_string_form() {
        let value = dec("1/3");
        let json = serde_json::to_string(&value).expect("serialize");
        assert_eq!(json, "\"1/3\"");
        let back: Dec = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, value);
    }

    #[test]
    fn test_sum() {
        let total: Dec = [dec("0.1"), dec("0.2"), dec("0.7")].iter().sum();
        assert_eq!(total, Dec::one());
    }
}
