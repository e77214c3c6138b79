use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

//--------------------------------------       Amount        ---------------------------------------------------------
/// A balance or purchase value. Whether it represents points or currency units is up to the reward strategy that
/// produced it.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Amount(f64);

op!(Amount:
    binary Add::add,
    binary Sub::sub,
    inplace AddAssign::add_assign,
    inplace SubAssign::sub_assign,
    unary Neg::neg,
);

impl Mul<f64> for Amount {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be used as an amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for Amount {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        Self(value as f64)
    }
}

impl TryFrom<f64> for Amount {
    type Error = AmountConversionError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_finite() {
            Ok(Self(value))
        } else {
            Err(AmountConversionError(format!("{value} is not a finite number")))
        }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0.2}", self.0)
    }
}

impl Amount {
    pub const fn zero() -> Self {
        Self(0.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0.0
    }

    /// Returns the smaller of the two amounts.
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Amount::from(10);
        let b = Amount::try_from(2.5).unwrap();
        assert_eq!(a + b, Amount::try_from(12.5).unwrap());
        assert_eq!(a - b, Amount::try_from(7.5).unwrap());
        assert_eq!(-b, Amount::try_from(-2.5).unwrap());
        assert_eq!(a * 0.05, Amount::try_from(0.5).unwrap());
        assert_eq!(a.min(b), b);
        let total: Amount = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Amount::from(15));
    }

    #[test]
    fn non_finite_values_are_rejected() {
        assert!(Amount::try_from(f64::NAN).is_err());
        assert!(Amount::try_from(f64::INFINITY).is_err());
    }

    #[test]
    fn display() {
        assert_eq!(Amount::try_from(20.0).unwrap().to_string(), "20.00");
        assert_eq!(Amount::try_from(-3.456).unwrap().to_string(), "-3.46");
    }
}
