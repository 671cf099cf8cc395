use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

/// The number of fractional digits between a currency unit and its minor unit (cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

//--------------------------------------     MinorUnits       ---------------------------------------------------------
/// An amount of loyalty currency, expressed as an integer number of minor units.
///
/// All internal arithmetic and storage happens in minor units. Conversion to and from the decimal representation used
/// at the API boundary goes through [`MinorUnits::from_decimal`] and [`MinorUnits::to_decimal`], which never touch
/// binary floating point.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct MinorUnits(i64);

op!(binary MinorUnits, Add, add);
op!(binary MinorUnits, Sub, sub);
op!(inplace MinorUnits, AddAssign, add_assign);
op!(inplace MinorUnits, SubAssign, sub_assign);
op!(unary MinorUnits, Neg, neg);

impl Sum for MinorUnits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in minor units: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<Decimal> for MinorUnits {
    type Error = AmountConversionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::from_decimal(value)
    }
}

impl From<MinorUnits> for Decimal {
    fn from(value: MinorUnits) -> Self {
        value.to_decimal()
    }
}

impl FromStr for MinorUnits {
    type Err = AmountConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|e| AmountConversionError(format!("{s} is not a decimal amount. {e}")))?;
        Self::from_decimal(amount)
    }
}

impl Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl MinorUnits {
    pub const ZERO: Self = Self(0);

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Converts a decimal currency amount into minor units, rounding half-up (away from zero on a tie) to the nearest
    /// minor unit.
    pub fn from_decimal(amount: Decimal) -> Result<Self, AmountConversionError> {
        let rounded = amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|scaled| scaled.to_i64())
            .map(Self)
            .ok_or_else(|| AmountConversionError(format!("{amount} is out of range")))
    }

    /// Converts the amount back into currency units. This is exact: the result always carries two fractional digits.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }
}
