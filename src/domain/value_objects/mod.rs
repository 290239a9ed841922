//! Value objects shared across the order domain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object: an amount in a single currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self { amount, currency: currency.to_string() }
    }
    pub fn zero(currency: &str) -> Self { Self::new(Decimal::ZERO, currency) }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn currency(&self) -> &str { &self.currency }
    pub fn is_negative(&self) -> bool { self.amount < Decimal::ZERO }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn subtract(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency { return Err(MoneyError::CurrencyMismatch); }
        Ok(Money::new(self.amount - other.amount, &self.currency))
    }
}

impl Default for Money { fn default() -> Self { Self::zero("TRY") } }

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} {}", self.amount, self.currency) }
}

#[derive(Debug, Clone)] pub enum MoneyError { CurrencyMismatch }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Currency mismatch") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_arithmetic() {
        let a = Money::new(Decimal::new(100, 0), "TRY");
        let b = Money::new(Decimal::new(30, 0), "TRY");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(130, 0));
        assert_eq!(a.subtract(&b).unwrap().amount(), Decimal::new(70, 0));
        assert!(b.subtract(&a).unwrap().is_negative());
    }

    #[test]
    fn test_currency_mismatch() {
        let a = Money::new(Decimal::new(10, 0), "TRY");
        let b = Money::new(Decimal::new(10, 0), "USD");
        assert!(a.add(&b).is_err());
    }
}
