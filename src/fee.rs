//! Rental fee model
//!
//! Fees are derived from a book's page count: one cent per page, i.e.
//! `pages / 100` dollars per extended month. Amounts are kept as integer
//! cents so the arithmetic is exact; binary floating point is never used
//! for money anywhere in this crate.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A monetary amount in whole cents.
///
/// Serialized to JSON as a fixed-point string (e.g. `"3.00"`) so clients
/// never see floating-point artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: u64) -> Self {
        Money(cents)
    }

    pub fn cents(self) -> u64 {
        self.0
    }
}

/// Monthly rental fee for a book with the given page count.
///
/// `pages / 100` dollars rounded to cents is exactly `pages` cents, so the
/// computation is total and exact: 0 pages (or an unset page count stored
/// as 0) costs nothing, and the fee never decreases as pages grow.
pub fn monthly_fee(page_count: u32) -> Money {
    Money(page_count as u64)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Money {
    type Output = Money;

    fn mul(self, rhs: u32) -> Money {
        Money(self.0 * rhs as u64)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl FromStr for Money {
    type Err = String;

    /// Parses a fixed-point decimal string with at most two fractional
    /// digits, e.g. `"3"`, `"3.5"`, `"3.50"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac.len() > 2 {
            return Err(format!("too many decimal places in amount: {s}"));
        }
        let whole: u64 = whole
            .parse()
            .map_err(|_| format!("invalid amount: {s}"))?;
        let frac_cents: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<2}");
            padded.parse().map_err(|_| format!("invalid amount: {s}"))?
        };
        Ok(Money(whole * 100 + frac_cents))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
