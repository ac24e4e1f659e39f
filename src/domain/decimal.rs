//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Prices, segment values and cost basis all use this type. Currency balances
//! stay whole `i64` units; conversions between the two go through the
//! rounding helpers here so every call site rounds the same way.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal as RustDecimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places retained for prices and average cost.
pub const PRICE_DP: u32 = 4;

/// Lossless decimal numeric type for prices.
///
/// Serializes to JSON number (not string).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// Convert from a float; `None` for NaN or infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        RustDecimal::from_f64(value).map(Decimal)
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Round half away from zero to `dp` decimal places.
    pub fn round_dp(&self, dp: u32) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Truncate toward zero to `dp` decimal places.
    pub fn truncate_dp(&self, dp: u32) -> Self {
        Decimal(self.0.round_dp_with_strategy(dp, RoundingStrategy::ToZero))
    }

    /// Round to the price precision.
    pub fn round_price(&self) -> Self {
        self.round_dp(PRICE_DP)
    }

    /// Round half away from zero to whole currency units.
    ///
    /// Returns `None` if the value does not fit in an `i64`.
    pub fn round_units(&self) -> Option<i64> {
        self.round_dp(0).0.to_i64()
    }

    pub fn sqrt(&self) -> Option<Self> {
        self.0.sqrt().map(Decimal)
    }

    /// Natural logarithm; `None` for non-positive values.
    pub fn checked_ln(&self) -> Option<Self> {
        self.0.checked_ln().map(Decimal)
    }

    pub fn checked_exp(&self) -> Option<Self> {
        self.0.checked_exp().map(Decimal)
    }

    pub fn checked_div(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// Multiply; `None` if the product exceeds the representable range.
    pub fn checked_mul(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn checked_add(&self, rhs: Decimal) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal::from_i64(value)
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Decimal {
    type Output = Decimal;

    fn sub(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 - rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::ops::Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_no_exponent() {
        let formatted = d("1020.0000").to_canonical_string();
        assert!(!formatted.contains('e'));
        assert_eq!(formatted, "1020");
    }

    #[test]
    fn test_round_units_half_away_from_zero() {
        assert_eq!(d("2.5").round_units(), Some(3));
        assert_eq!(d("3.5").round_units(), Some(4));
        assert_eq!(d("2.49").round_units(), Some(2));
        assert_eq!(d("-2.5").round_units(), Some(-3));
    }

    #[test]
    fn test_round_price_keeps_four_places() {
        assert_eq!(d("1414.21356").round_price(), d("1414.2136"));
        assert_eq!(d("150").round_price(), d("150"));
    }

    #[test]
    fn test_decimal_json_serialization() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "123.456");
    }

    #[test]
    fn test_math_helpers() {
        assert_eq!(d("4").sqrt().unwrap().round_dp(6), d("2"));
        assert!(d("0").checked_ln().is_none());
        assert!(d("-1").checked_ln().is_none());
        let e = d("1").checked_exp().unwrap();
        assert_eq!(e.round_dp(3), d("2.718"));
    }

    #[test]
    fn test_decimal_arithmetic() {
        let a = d("10.5");
        let b = d("2.5");
        assert_eq!((a + b).to_canonical_string(), "13");
        assert_eq!((a - b).to_canonical_string(), "8");
        assert_eq!((a * b).to_canonical_string(), "26.25");
        assert_eq!((a / b).to_canonical_string(), "4.2");
        assert!(a.checked_div(Decimal::zero()).is_none());
    }

    #[test]
    fn test_checked_arithmetic_overflow() {
        let max = d("79228162514264337593543950335");
        assert_eq!(d("2").checked_mul(d("3")), Some(d("6")));
        assert!(d("10000000000000000000000000000").checked_mul(d("1000")).is_none());
        assert_eq!(d("1.5").checked_add(d("2")), Some(d("3.5")));
        assert!(max.checked_add(d("1")).is_none());
    }
}
