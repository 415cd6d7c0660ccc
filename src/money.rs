//! Money value type
//!
//! Thin newtype over `rust_decimal::Decimal` so balances and transfer
//! amounts never mix with raw numerics. Amounts cross the API boundary as
//! JSON strings and are parsed here; float input is rejected at the
//! gateway before this type is ever constructed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// Arbitrary-precision monetary amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Get the inner decimal value (for SQL binds and formatting).
    pub fn inner(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Money(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Money(Decimal::from_str(s)?))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Money::from(100);
        let b = Money::from(30);

        assert_eq!(a + b, Money::from(130));
        assert_eq!(a - b, Money::from(70));

        let mut c = a;
        c -= b;
        assert_eq!(c, Money::from(70));
        c += b;
        assert_eq!(c, a);
    }

    #[test]
    fn test_ordering() {
        assert!(Money::from(5) < Money::from(7));
        assert!(Money::from(7) > Money::ZERO);
        assert!(!Money::ZERO.is_positive());
        assert!(Money::from(1).is_positive());
        assert!(!Money::from(-1).is_positive());
    }

    #[test]
    fn test_parse_and_display() {
        let m: Money = "123.4500".parse().unwrap();
        assert_eq!(m.to_string(), "123.4500");
        assert_eq!(m, Money::new(Decimal::new(1234500, 4)));

        assert!("not-a-number".parse::<Money>().is_err());
    }

    #[test]
    fn test_serde_string_payload() {
        let m: Money = "10.50".parse().unwrap();
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"10.50\"");
    }
}
