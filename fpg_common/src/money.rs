use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "INR";

//--------------------------------------      Money       ------------------------------------------------------------
/// An amount of money in whole currency units, as the collect gateway quotes it.
///
/// Order amounts, transaction amounts and fees all share this representation, so that amounts arriving over the
/// wire can be compared against stored amounts without unit conversions.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Money {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Money {}

impl TryFrom<u64> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(MoneyConversionError(format!("Value {value} is too large to convert to Money")))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "₹{}", self.0)
    }
}

impl Money {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic_forwards_to_inner_value() {
        let a = Money::from(1_000);
        let b = Money::from(250);
        assert_eq!((a + b).value(), 1_250);
        assert_eq!((a - b).value(), 750);
        assert_eq!((-b).value(), -250);
        let mut c = a;
        c -= b;
        assert_eq!(c, Money::from(750));
    }

    #[test]
    fn positivity() {
        assert!(Money::from(1).is_positive());
        assert!(!Money::from(0).is_positive());
        assert!(!Money::from(-5).is_positive());
    }

    #[test]
    fn display_uses_currency_symbol() {
        assert_eq!(Money::from(1500).to_string(), "₹1500");
    }
}
