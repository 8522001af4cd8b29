//! Value objects for the ordering domain

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Monetary amount in BRL. The counter sells in a single currency, so the
/// arithmetic is closed over the amount and never fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_positive(&self) -> bool { self.0 > Decimal::ZERO }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }
}

impl Add for Money {
    type Output = Money;
    fn add(self, other: Money) -> Money { Money(self.0 + other.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

/// Stock counter for catalog products
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Self { Self(value) }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: u32) -> Self { Self(self.0.saturating_add(other)) }
    pub fn subtract(&self, other: u32) -> Option<Self> {
        if other > self.0 { None } else { Some(Self(self.0 - other)) }
    }
    pub fn is_zero(&self) -> bool { self.0 == 0 }
    pub fn covers(&self, requested: u32) -> bool { self.0 >= requested }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_sum_and_multiply() {
        let unit = Money::new(Decimal::new(1890, 2));
        let line = unit.multiply(2);
        assert_eq!(line.amount(), Decimal::new(3780, 2));
        let total: Money = [line, Money::ZERO].into_iter().sum();
        assert_eq!(total, line);
    }

    #[test]
    fn test_quantity_subtract() {
        let q = Quantity::new(5);
        assert_eq!(q.subtract(2), Some(Quantity::new(3)));
        assert_eq!(q.subtract(6), None);
        assert!(q.covers(5));
        assert!(!q.covers(6));
    }
}
