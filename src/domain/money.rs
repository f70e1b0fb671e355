use crate::error::{OrderError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// Number of fractional digits in the canonical money representation.
pub const MONEY_SCALE: u32 = 2;

/// Upper bound for any single caller-supplied or catalog amount
/// (1,000,000,000,000). Keeps every derived sum far from `Decimal::MAX`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// A monetary value backed by an arbitrary-precision decimal.
///
/// Arithmetic is exact; rounding to [`MONEY_SCALE`] happens only when a value
/// is stored as a computed column (see [`Money::round`]) or rendered.
/// The canonical external form is a string with exactly two fractional
/// digits, e.g. `"12500.00"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Validates a caller-supplied amount: non-negative, at most
    /// [`MAX_AMOUNT`], with at most two fractional digits.
    pub fn parse_input(value: Decimal, field: &str) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(OrderError::validation(format!(
                "{field} must not be negative"
            )));
        }
        Self::check_bounds(value, field)?;
        Ok(Self(value))
    }

    /// Checks magnitude and scale without constraining the sign.
    pub fn check_bounds(value: Decimal, field: &str) -> Result<()> {
        if value.abs() > MAX_AMOUNT {
            return Err(OrderError::validation(format!(
                "{field} exceeds maximum allowed ({MAX_AMOUNT})"
            )));
        }
        if !has_money_scale(value) {
            return Err(OrderError::validation(format!(
                "{field} must have at most {MONEY_SCALE} decimal places"
            )));
        }
        Ok(())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiplies by an integer quantity.
    pub fn times(self, quantity: u32) -> Self {
        Self(self.0 * Decimal::from(quantity))
    }

    /// Returns `percent`% of this amount, unrounded.
    pub fn percent(self, percent: Decimal) -> Self {
        Self(self.0 * percent / Decimal::ONE_HUNDRED)
    }

    /// Rounds half away from zero to two fractional digits.
    pub fn round(self) -> Self {
        let mut rounded = self
            .0
            .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(MONEY_SCALE);
        Self(rounded)
    }

    pub fn min(self, other: Self) -> Self {
        if self <= other { self } else { other }
    }

    /// Subtraction floored at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs >= self { Self::ZERO } else { Self(self.0 - rhs.0) }
    }
}

fn has_money_scale(value: Decimal) -> bool {
    value.normalize().scale() <= MONEY_SCALE
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.round().0)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        if !has_money_scale(value) {
            return Err(D::Error::custom(format!(
                "money value {value} has more than {MONEY_SCALE} decimal places"
            )));
        }
        Ok(Self(value))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + *m)
    }
}
