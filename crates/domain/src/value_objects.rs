//! Value objects shared by carts and orders.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Product identifier as issued by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Creates a new product ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the product ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProductId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Decimal money amount.
///
/// Catalog prices carry fractional units (`19.99`); charged amounts are
/// whole units after conversion. Arithmetic is exact until
/// [`Money::round_half_up`] is applied.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    amount: Decimal,
}

impl Money {
    /// Creates a money amount from a decimal.
    pub fn new(amount: Decimal) -> Self {
        Self { amount }
    }

    /// Creates a money amount from whole units.
    pub fn from_units(units: i64) -> Self {
        Self {
            amount: Decimal::from(units),
        }
    }

    /// Creates a money amount from hundredths of a unit (`1999` is `19.99`).
    pub fn from_cents(cents: i64) -> Self {
        Self {
            amount: Decimal::new(cents, 2),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns the underlying decimal.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Multiplies by a quantity, saturating at the largest decimal.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            amount: self.amount.saturating_mul(Decimal::from(quantity)),
        }
    }

    /// Multiplies by an exchange factor without rounding, saturating at the
    /// largest decimal.
    pub fn convert(&self, factor: Decimal) -> Money {
        Money {
            amount: self.amount.saturating_mul(factor),
        }
    }

    /// Rounds to whole units, halves away from zero.
    pub fn round_half_up(&self) -> Money {
        Money {
            amount: self
                .amount
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
        }
    }

    /// Returns the amount rounded to whole units, or `None` if it does not fit.
    pub fn whole_units(&self) -> Option<i64> {
        self.round_half_up().amount.to_i64()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self { amount }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.amount)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            amount: self.amount.saturating_add(rhs.amount),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            amount: self.amount.saturating_sub(rhs.amount),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.amount = self.amount.saturating_add(rhs.amount);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_id_string_conversion() {
        let id = ProductId::new("7");
        assert_eq!(id.as_str(), "7");

        let id2: ProductId = "12".into();
        assert_eq!(id2.to_string(), "12");
    }

    #[test]
    fn test_money_from_cents_equals_units() {
        assert_eq!(Money::from_cents(2000), Money::from_units(20));
        assert_eq!(Money::from_cents(1999).to_string(), "19.99");
        assert_eq!(Money::from_units(5).to_string(), "5.00");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(250);

        assert_eq!(a + b, Money::from_cents(1250));
        assert_eq!(a - b, Money::from_cents(750));
        assert_eq!(b.multiply(3), Money::from_cents(750));

        let mut total = Money::zero();
        total += a;
        assert_eq!(total, a);

        let sum: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(sum, Money::from_cents(1500));
    }

    #[test]
    fn test_convert_keeps_fraction_until_rounded() {
        let price = Money::from_cents(1999);
        let converted = price.convert(Decimal::from(85));
        assert_eq!(converted, Money::from_cents(169915));
        assert_eq!(converted.round_half_up(), Money::from_units(1699));
    }

    #[test]
    fn test_round_half_up_on_midpoint() {
        assert_eq!(Money::from_cents(250).round_half_up(), Money::from_units(3));
        assert_eq!(Money::from_cents(249).round_half_up(), Money::from_units(2));
        assert_eq!(Money::from_cents(1250).whole_units(), Some(13));
    }

    #[test]
    fn test_money_sign_checks() {
        assert!(Money::from_cents(100).is_positive());
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(-100).is_negative());
        assert!(!Money::zero().is_positive());
    }

    #[test]
    fn test_money_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::from_cents(1999)).unwrap();
        assert_eq!(json, "\"19.99\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Money::from_cents(1999));
    }

    #[test]
    fn test_money_saturates_instead_of_overflowing() {
        let huge = Money::new(Decimal::MAX);

        assert_eq!(huge.multiply(u32::MAX), huge);
        assert_eq!(huge.convert(Decimal::from(85)), huge);
        assert_eq!(huge + huge, huge);

        let sum: Money = vec![huge, huge, Money::from_units(1)].into_iter().sum();
        assert_eq!(sum, huge);
    }
}
