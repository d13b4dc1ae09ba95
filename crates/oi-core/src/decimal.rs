//! Precision-safe open-interest quantities.
//!
//! The exchange reports open interest as decimal text. Values are kept in
//! `rust_decimal` so averages, guard multipliers and percentages are exact.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Open-interest amount (contracts or notional, depending on the field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenInterest(pub Decimal);

impl OpenInterest {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Percentage difference from a reference value.
    ///
    /// Returns None when the reference is zero.
    #[inline]
    pub fn pct_from(&self, reference: OpenInterest) -> Option<Decimal> {
        if reference.is_zero() {
            return None;
        }
        Some((self.0 - reference.0) / reference.0 * Decimal::ONE_HUNDRED)
    }

    /// Arithmetic mean of a sequence of values.
    ///
    /// Returns None for an empty sequence.
    pub fn mean<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = OpenInterest>,
    {
        let mut sum = Decimal::ZERO;
        let mut count: u64 = 0;
        for v in values {
            sum += v.0;
            count += 1;
        }
        if count == 0 {
            return None;
        }
        Some(Self(sum / Decimal::from(count)))
    }

    /// Human-readable magnitude, e.g. `1.23M`, `45.60K`, `2.10B`.
    pub fn shortened(&self) -> String {
        let abs = self.0.abs();
        let thousand = Decimal::from(1_000);
        let million = Decimal::from(1_000_000);
        let billion = Decimal::from(1_000_000_000);

        let (scaled, suffix) = if abs >= billion {
            (self.0 / billion, "B")
        } else if abs >= million {
            (self.0 / million, "M")
        } else if abs >= thousand {
            (self.0 / thousand, "K")
        } else {
            (self.0, "")
        };

        format!("{:.2}{}", scaled.round_dp(2), suffix)
    }
}

impl fmt::Display for OpenInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OpenInterest {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for OpenInterest {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for OpenInterest {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for OpenInterest {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for OpenInterest {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for OpenInterest {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}
