use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "MYR";

//--------------------------------------       Money         ---------------------------------------------------------
/// An amount of money, held as a whole number of currency minor units (cents, sen).
///
/// Floating point is never used for money. Parsing accepts at most two fractional digits, so `"100.00"`, `"100.5"`
/// and `"RM 1,200.50"` are all valid, while `"1.005"` is rejected.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from_minor(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl Money {
    pub const fn from_minor(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub const fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns `bps` basis points of this amount (1% = 100bps), rounded half away from zero to the nearest minor
    /// unit. This is the same as `amount * percentage / 100` rounded to two decimal places.
    pub fn percent_bps(&self, bps: i64) -> Self {
        let product = i128::from(self.0) * i128::from(bps);
        let rounded = (product.abs() + 5_000) / 10_000;
        let signed = if product < 0 { -rounded } else { rounded };
        #[allow(clippy::cast_possible_truncation)]
        Self(signed as i64)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_alphabetic() || c.is_whitespace())
            .replace(',', "");
        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.as_str()),
        };
        if digits.is_empty() {
            return Err(MoneyConversionError(format!("'{s}' contains no amount")));
        }
        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if frac.len() > 2 {
            return Err(MoneyConversionError(format!("'{s}' has more than two decimal places")));
        }
        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) || (whole.is_empty() && frac.is_empty()) {
            return Err(MoneyConversionError(format!("'{s}' is not a decimal amount")));
        }
        let parse = |part: &str| part.parse::<i64>().map_err(|e| MoneyConversionError(e.to_string()));
        let whole = if whole.is_empty() { 0 } else { parse(whole)? };
        let frac = match frac.len() {
            0 => 0,
            1 => parse(frac)? * 10,
            _ => parse(frac)?,
        };
        let minor = whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| MoneyConversionError(format!("'{s}' is too large")))?;
        Ok(Self(if negative { -minor } else { minor }))
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Money> for String {
    fn from(value: Money) -> Self {
        value.to_string()
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}
